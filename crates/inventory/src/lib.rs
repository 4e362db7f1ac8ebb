//! Stock movement ledger records.
//!
//! Every inventory quantity change is captured as an immutable
//! [`StockMovement`] with a before/after snapshot. The ledger is append-only:
//! entries are never updated or deleted.

pub mod movement;

pub use movement::{MovementId, MovementType, StockMovement};
