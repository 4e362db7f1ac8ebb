use serde::{Deserialize, Serialize};
use thiserror::Error;

use backroom_core::AggregateId;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Catalog record as this core sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current on-hand quantity. Non-negative by type.
    pub stock_quantity: u32,
}

/// Catalog access failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The catalog backend could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Minimal contract this core needs from the product catalog.
pub trait ProductCatalog: Send + Sync {
    fn exists(&self, product_id: ProductId) -> Result<bool, CatalogError>;

    /// Current on-hand quantity.
    fn stock(&self, product_id: ProductId) -> Result<u32, CatalogError>;

    /// Overwrite the on-hand quantity.
    ///
    /// Callers are expected to hold the receiving engine's stock gate for the
    /// read-compute-write sequence; the catalog itself does not serialize
    /// callers.
    fn set_stock(&self, product_id: ProductId, quantity: u32) -> Result<(), CatalogError>;
}
