use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backroom_catalog::ProductId;
use backroom_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Money, Totals, UserId,
};
use backroom_events::Event;

/// Sales order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Fulfillment status.
///
/// Linear happy path `pending → confirmed → processing → packed → shipped →
/// out_for_delivery → delivered`, with `cancelled` and `refunded` side-exits.
/// Terminal: `delivered`, `cancelled`, `refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "packed" => Ok(Self::Packed),
            "shipped" => Ok(Self::Shipped),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(DomainError::validation(format!(
                "unrecognized order status '{other}'"
            ))),
        }
    }
}

/// Transition policy, spelled out per source status.
///
/// Deliberately permissive: any non-terminal status may move to any
/// recognized target except `cancelled`, which is only reachable through the
/// distinct cancel operation. Backward jumps (e.g. `shipped → pending`) are
/// allowed silently; the terminal guard is the only hard stop.
pub fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match (from, to) {
        // Cancellation has its own operation and guard.
        (_, Cancelled) => false,
        (Delivered | Cancelled | Refunded, _) => false,
        (Pending | Confirmed | Processing | Packed | Shipped | OutForDelivery, _) => true,
    }
}

/// Embedded customer snapshot (no customer directory dependency).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Shipping destination snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Payment details carried on the order and snapshotted into the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: String,
    pub reference: Option<String>,
    pub amount: Money,
    pub status: PaymentStatus,
}

/// Order line item (embedded; no independent lifecycle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price
            .checked_mul_qty(i64::from(self.quantity))
            .unwrap_or(Money::ZERO)
    }
}

/// Item as supplied on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// One append-only status history entry.
///
/// Invariant: the last entry's status always equals the order's current
/// status; entries are never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
    pub actor: UserId,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_number: String,
    customer: Option<Customer>,
    items: Vec<OrderItem>,
    totals: Totals,
    status: OrderStatus,
    status_history: Vec<StatusEntry>,
    shipping_address: Option<ShippingAddress>,
    payment: Option<PaymentInfo>,
    tracking_number: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
    assigned_to: Option<UserId>,
    packed_by: Option<UserId>,
    shipped_by: Option<UserId>,
    confirmed_at: Option<DateTime<Utc>>,
    packed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            customer: None,
            items: Vec::new(),
            totals: Totals::default(),
            status: OrderStatus::Pending,
            status_history: Vec::new(),
            shipping_address: None,
            payment: None,
            tracking_number: None,
            estimated_delivery: None,
            assigned_to: None,
            packed_by: None,
            shipped_by: None,
            confirmed_at: None,
            packed_at: None,
            shipped_at: None,
            delivered_at: None,
            actual_delivery: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn status_history(&self) -> &[StatusEntry] {
        &self.status_history
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn payment(&self) -> Option<&PaymentInfo> {
        self.payment.as_ref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    pub fn packed_by(&self) -> Option<UserId> {
        self.packed_by
    }

    pub fn shipped_by(&self) -> Option<UserId> {
        self.shipped_by
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn packed_at(&self) -> Option<DateTime<Utc>> {
        self.packed_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder (starts in `pending`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer: Customer,
    pub items: Vec<NewOrderItem>,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: PaymentInfo,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateStatus — one fulfillment transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub assigned_to: Option<UserId>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder — terminal side-exit with a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: String,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    UpdateStatus(UpdateStatus),
    CancelOrder(CancelOrder),
}

/// Event: Created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub totals: Totals,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: PaymentInfo,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub assigned_to: Option<UserId>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancelled {
    pub order_id: OrderId,
    pub reason: String,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    Created(Created),
    StatusChanged(StatusChanged),
    Cancelled(Cancelled),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "orders.order.created",
            OrderEvent::StatusChanged(_) => "orders.order.status_changed",
            OrderEvent::Cancelled(_) => "orders.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Created(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
            OrderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Created(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.customer = Some(e.customer.clone());
                self.items = e.items.clone();
                self.totals = e.totals;
                self.status = OrderStatus::Pending;
                self.status_history.push(StatusEntry {
                    status: OrderStatus::Pending,
                    at: e.occurred_at,
                    notes: None,
                    actor: e.actor,
                });
                self.shipping_address = e.shipping_address.clone();
                self.payment = Some(e.payment.clone());
                self.created = true;
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.status;
                self.status_history.push(StatusEntry {
                    status: e.status,
                    at: e.occurred_at,
                    notes: e.notes.clone(),
                    actor: e.actor,
                });

                // Milestone timestamps are set exactly once, at the first
                // transition into the status.
                match e.status {
                    OrderStatus::Confirmed => {
                        self.confirmed_at.get_or_insert(e.occurred_at);
                    }
                    OrderStatus::Packed => {
                        self.packed_at.get_or_insert(e.occurred_at);
                        self.packed_by = Some(e.actor);
                    }
                    OrderStatus::Shipped => {
                        self.shipped_at.get_or_insert(e.occurred_at);
                        self.shipped_by = Some(e.actor);
                    }
                    OrderStatus::Delivered => {
                        self.delivered_at.get_or_insert(e.occurred_at);
                        self.actual_delivery.get_or_insert(e.occurred_at);
                    }
                    _ => {}
                }

                if e.tracking_number.is_some() {
                    self.tracking_number = e.tracking_number.clone();
                }
                if e.estimated_delivery.is_some() {
                    self.estimated_delivery = e.estimated_delivery;
                }
                if e.assigned_to.is_some() {
                    self.assigned_to = e.assigned_to;
                }
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.status_history.push(StatusEntry {
                    status: OrderStatus::Cancelled,
                    at: e.occurred_at,
                    notes: Some(e.reason.clone()),
                    actor: e.actor,
                });
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::UpdateStatus(cmd) => self.handle_update_status(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if cmd.customer.name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation("order must have at least one item"));
        }
        if cmd.payment.amount.is_negative() {
            return Err(DomainError::validation("payment amount must not be negative"));
        }

        let mut items = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            if item.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity must be positive for product {}",
                    item.product_id
                )));
            }
            if item.unit_price.is_negative() {
                return Err(DomainError::validation(format!(
                    "unit price must not be negative for product {}",
                    item.product_id
                )));
            }
            items.push(OrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        let subtotal = items.iter().try_fold(Money::ZERO, |acc, item| {
            item.unit_price
                .checked_mul_qty(i64::from(item.quantity))
                .and_then(|line| acc.checked_add(line))
                .ok_or_else(|| DomainError::validation("order subtotal overflowed"))
        })?;
        let totals = Totals::new(subtotal, cmd.tax, cmd.shipping, cmd.discount)?;

        Ok(vec![OrderEvent::Created(Created {
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            customer: cmd.customer.clone(),
            items,
            totals,
            shipping_address: cmd.shipping_address.clone(),
            payment: cmd.payment.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_status(&self, cmd: &UpdateStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if cmd.status == OrderStatus::Cancelled {
            return Err(DomainError::validation(
                "cancellation goes through the cancel operation",
            ));
        }
        if !transition_allowed(self.status, cmd.status) {
            return Err(DomainError::conflict(format!(
                "cannot move order from terminal status {}",
                self.status.as_str()
            )));
        }

        Ok(vec![OrderEvent::StatusChanged(StatusChanged {
            order_id: cmd.order_id,
            status: cmd.status,
            notes: cmd.notes.clone(),
            tracking_number: cmd.tracking_number.clone(),
            estimated_delivery: cmd.estimated_delivery,
            assigned_to: cmd.assigned_to,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "cannot cancel order in status {}",
                self.status.as_str()
            )));
        }

        Ok(vec![OrderEvent::Cancelled(Cancelled {
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}
