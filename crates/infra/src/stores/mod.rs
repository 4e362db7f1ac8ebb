//! Collaborator stores: product catalog, stock ledger, sale store.

pub mod catalog;
pub mod ledger;
pub mod sales;

pub use catalog::InMemoryProductCatalog;
pub use ledger::{InMemoryStockLedger, StockLedger};
pub use sales::{InMemorySaleStore, SaleStore};
