//! Sales order fulfillment state machine.
//!
//! The [`Order`] aggregate advances through a fixed lifecycle
//! (`pending → … → delivered`) while recording an append-only status history
//! and set-once milestone timestamps. Cancellation is a distinct operation
//! with its own guard; orders are never physically deleted.

pub mod order;

pub use order::{
    CancelOrder, CreateOrder, Customer, NewOrderItem, Order, OrderCommand, OrderEvent, OrderId,
    OrderItem, OrderStatus, PaymentInfo, PaymentStatus, ShippingAddress, StatusEntry, UpdateStatus,
    transition_allowed,
};
