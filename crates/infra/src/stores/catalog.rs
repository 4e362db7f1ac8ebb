use std::collections::HashMap;
use std::sync::RwLock;

use backroom_catalog::{CatalogError, Product, ProductCatalog, ProductId};

/// In-memory product catalog for tests/dev.
///
/// The real catalog lives outside this core; this implementation exists so
/// the receiving engine has something to read and write stock against.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, product: Product) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product.id, product);
        }
    }

    pub fn get(&self, product_id: ProductId) -> Option<Product> {
        self.products.read().ok()?.get(&product_id).cloned()
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn exists(&self, product_id: ProductId) -> Result<bool, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Unavailable("lock poisoned".to_string()))?;
        Ok(products.contains_key(&product_id))
    }

    fn stock(&self, product_id: ProductId) -> Result<u32, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|_| CatalogError::Unavailable("lock poisoned".to_string()))?;
        products
            .get(&product_id)
            .map(|p| p.stock_quantity)
            .ok_or(CatalogError::ProductNotFound(product_id))
    }

    fn set_stock(&self, product_id: ProductId, quantity: u32) -> Result<(), CatalogError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| CatalogError::Unavailable("lock poisoned".to_string()))?;
        let product = products
            .get_mut(&product_id)
            .ok_or(CatalogError::ProductNotFound(product_id))?;
        product.stock_quantity = quantity;
        Ok(())
    }
}
