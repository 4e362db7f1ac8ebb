//! Product catalog collaborator contract.
//!
//! The catalog is the single source of truth for current on-hand stock. This
//! core consumes it through the minimal [`ProductCatalog`] trait; the
//! catalog's own CRUD surface lives elsewhere. Stock is mutated only through
//! the receiving engine's ledger apply step (and, outside this core, the
//! sales-checkout path) — no other code may call `set_stock`.

pub mod product;

pub use product::{CatalogError, Product, ProductCatalog, ProductId};
