//! Completed-sale records materialized from delivered orders.

pub mod sale;

pub use sale::{Sale, SaleItem, SalePayment, SaleStatus};
