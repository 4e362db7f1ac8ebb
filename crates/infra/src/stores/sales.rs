use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use backroom_core::{DomainError, DomainResult};
use backroom_sales::Sale;

/// Sale persistence keyed by source order number.
///
/// `insert_if_absent` is the duplicate-conversion guard: the first writer for
/// an order number wins and every later caller gets that same sale back.
pub trait SaleStore: Send + Sync {
    /// Insert the sale unless one already exists for its order number.
    /// Returns the stored sale either way.
    fn insert_if_absent(&self, sale: Sale) -> DomainResult<Sale>;

    fn get(&self, order_number: &str) -> Option<Sale>;

    fn list(&self) -> Vec<Sale>;
}

impl<S> SaleStore for Arc<S>
where
    S: SaleStore + ?Sized,
{
    fn insert_if_absent(&self, sale: Sale) -> DomainResult<Sale> {
        (**self).insert_if_absent(sale)
    }

    fn get(&self, order_number: &str) -> Option<Sale> {
        (**self).get(order_number)
    }

    fn list(&self) -> Vec<Sale> {
        (**self).list()
    }
}

/// In-memory sale store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySaleStore {
    sales: RwLock<HashMap<String, Sale>>,
}

impl InMemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaleStore for InMemorySaleStore {
    fn insert_if_absent(&self, sale: Sale) -> DomainResult<Sale> {
        let mut sales = self
            .sales
            .write()
            .map_err(|_| DomainError::invariant("sale store lock poisoned"))?;
        let stored = sales
            .entry(sale.order_number.clone())
            .or_insert(sale)
            .clone();
        Ok(stored)
    }

    fn get(&self, order_number: &str) -> Option<Sale> {
        self.sales.read().ok()?.get(order_number).cloned()
    }

    fn list(&self) -> Vec<Sale> {
        match self.sales.read() {
            Ok(sales) => sales.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}
