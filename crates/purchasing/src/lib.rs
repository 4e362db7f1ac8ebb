//! Purchase order lifecycle and receiving reconciliation.
//!
//! The [`PurchaseOrder`] aggregate owns its items: every mutation goes
//! through the aggregate so the `0 ≤ received ≤ ordered` invariant holds
//! atomically. Receiving validation is all-or-nothing — one bad line rejects
//! the whole delivery with every offending line reported.

pub mod order;

pub use order::{
    AcceptedLine, AddItem, CancelOrder, ConfirmOrder, CreatePurchaseOrder, DeleteDraft,
    DeliveryRecorded, NewItem, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent,
    PurchaseOrderId, PurchaseOrderItem, PurchaseOrderStatus, ReceiveDelivery, ReceivingLine,
    SendOrder, SupplierId,
};
