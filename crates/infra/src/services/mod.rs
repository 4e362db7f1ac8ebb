//! Orchestration services sitting between the HTTP edge and the aggregates.

pub mod fulfillment;
pub mod receiving;

pub use fulfillment::FulfillmentService;
pub use receiving::ReceivingEngine;
