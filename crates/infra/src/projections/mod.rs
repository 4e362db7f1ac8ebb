//! Read-side projections.
//!
//! Each projection maintains a flat read model keyed by aggregate id,
//! guarded by a per-aggregate sequence cursor so re-delivered envelopes are
//! ignored rather than double-applied. Projections implement
//! [`backroom_events::EventSink`] and are fed synchronously by the dispatcher.

pub mod orders;
pub mod purchase_orders;

use thiserror::Error;

pub use orders::{OrderReadModel, OrdersProjection};
pub use purchase_orders::{PurchaseOrderReadModel, PurchaseOrdersProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("sequence gap (last={last}, found={found})")]
    SequenceGap { last: u64, found: u64 },

    #[error("envelope/event mismatch: {0}")]
    Mismatch(String),
}
