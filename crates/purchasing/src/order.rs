use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backroom_catalog::ProductId;
use backroom_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Money, Totals, UserId,
};
use backroom_events::Event;

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier reference (weak — the supplier directory lives elsewhere).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
///
/// `draft → sent → confirmed → partial_received → fully_received`, with
/// `cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Confirmed,
    PartialReceived,
    FullyReceived,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::FullyReceived | Self::Cancelled)
    }

    /// Deliveries may only be recorded against an order that has left draft
    /// and is not finished.
    pub fn is_receivable(self) -> bool {
        matches!(self, Self::Sent | Self::Confirmed | Self::PartialReceived)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Confirmed => "confirmed",
            Self::PartialReceived => "partial_received",
            Self::FullyReceived => "fully_received",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Purchase order line item (embedded; no independent lifecycle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub product_id: ProductId,
    pub ordered_quantity: u32,
    /// Monotonically non-decreasing, never above `ordered_quantity`.
    pub received_quantity: u32,
    pub unit_cost: Money,
    pub notes: Option<String>,
}

impl PurchaseOrderItem {
    pub fn total_cost(&self) -> Money {
        // ordered_quantity fits in i64, cost overflow is validated at create.
        self.unit_cost
            .checked_mul_qty(i64::from(self.ordered_quantity))
            .unwrap_or(Money::ZERO)
    }

    pub fn outstanding(&self) -> u32 {
        self.ordered_quantity.saturating_sub(self.received_quantity)
    }
}

/// Item as supplied on creation / draft edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub product_id: ProductId,
    pub ordered_quantity: u32,
    pub unit_cost: Money,
    pub notes: Option<String>,
}

/// One line of a receiving call, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub notes: Option<String>,
}

/// A receiving line that passed validation, enriched with the order item's
/// unit cost for downstream ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_cost: Money,
    pub notes: Option<String>,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    order_number: String,
    supplier_id: Option<SupplierId>,
    status: PurchaseOrderStatus,
    items: Vec<PurchaseOrderItem>,
    totals: Totals,
    currency: String,
    payment_terms: Option<String>,
    notes: Option<String>,
    ordered_date: Option<DateTime<Utc>>,
    expected_delivery: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,
    received_by: Option<UserId>,
    receiving_notes: Option<String>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            supplier_id: None,
            status: PurchaseOrderStatus::Draft,
            items: Vec::new(),
            totals: Totals::default(),
            currency: String::new(),
            payment_terms: None,
            notes: None,
            ordered_date: None,
            expected_delivery: None,
            actual_delivery: None,
            received_by: None,
            receiving_notes: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn items(&self) -> &[PurchaseOrderItem] {
        &self.items
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_terms(&self) -> Option<&str> {
        self.payment_terms.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn ordered_date(&self) -> Option<DateTime<Utc>> {
        self.ordered_date
    }

    pub fn expected_delivery(&self) -> Option<DateTime<Utc>> {
        self.expected_delivery
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }

    pub fn received_by(&self) -> Option<UserId> {
        self.received_by
    }

    pub fn receiving_notes(&self) -> Option<&str> {
        self.receiving_notes.as_deref()
    }

    pub fn item(&self, product_id: ProductId) -> Option<&PurchaseOrderItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder (starts in `draft`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub items: Vec<NewItem>,
    pub currency: String,
    pub payment_terms: Option<String>,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem (only allowed in `draft`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub order_id: PurchaseOrderId,
    pub item: NewItem,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendOrder (`draft → sent`; structural edits are frozen after this).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOrder {
    pub order_id: PurchaseOrderId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder (`sent → confirmed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub order_id: PurchaseOrderId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder (side-exit from any non-terminal state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: PurchaseOrderId,
    pub reason: String,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteDraft (explicit deletion, only while still `draft`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDraft {
    pub order_id: PurchaseOrderId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveDelivery — reconcile a supplier delivery against the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveDelivery {
    pub order_id: PurchaseOrderId,
    pub lines: Vec<ReceivingLine>,
    pub received_by: UserId,
    pub notes: Option<String>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    AddItem(AddItem),
    SendOrder(SendOrder),
    ConfirmOrder(ConfirmOrder),
    CancelOrder(CancelOrder),
    DeleteDraft(DeleteDraft),
    ReceiveDelivery(ReceiveDelivery),
}

/// Event: Created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub items: Vec<PurchaseOrderItem>,
    pub totals: Totals,
    pub currency: String,
    pub payment_terms: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded (draft edit; carries recomputed totals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub order_id: PurchaseOrderId,
    pub item: PurchaseOrderItem,
    pub totals: Totals,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sent {
    pub order_id: PurchaseOrderId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmed {
    pub order_id: PurchaseOrderId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancelled {
    pub order_id: PurchaseOrderId,
    pub reason: String,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DraftDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftDeleted {
    pub order_id: PurchaseOrderId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryRecorded.
///
/// One event per receiving call: every accepted line plus the recomputed
/// receipt status, so the append (and therefore the whole reconciliation) is
/// atomic. The receiving engine translates the accepted lines into catalog
/// stock updates and ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecorded {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub lines: Vec<AcceptedLine>,
    pub status: PurchaseOrderStatus,
    pub received_by: UserId,
    pub receiving_notes: Option<String>,
    /// Set when the delivery completes the order.
    pub actual_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    Created(Created),
    ItemAdded(ItemAdded),
    Sent(Sent),
    Confirmed(Confirmed),
    Cancelled(Cancelled),
    DraftDeleted(DraftDeleted),
    DeliveryRecorded(DeliveryRecorded),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::Created(_) => "purchasing.order.created",
            PurchaseOrderEvent::ItemAdded(_) => "purchasing.order.item_added",
            PurchaseOrderEvent::Sent(_) => "purchasing.order.sent",
            PurchaseOrderEvent::Confirmed(_) => "purchasing.order.confirmed",
            PurchaseOrderEvent::Cancelled(_) => "purchasing.order.cancelled",
            PurchaseOrderEvent::DraftDeleted(_) => "purchasing.order.draft_deleted",
            PurchaseOrderEvent::DeliveryRecorded(_) => "purchasing.order.delivery_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::Created(e) => e.occurred_at,
            PurchaseOrderEvent::ItemAdded(e) => e.occurred_at,
            PurchaseOrderEvent::Sent(e) => e.occurred_at,
            PurchaseOrderEvent::Confirmed(e) => e.occurred_at,
            PurchaseOrderEvent::Cancelled(e) => e.occurred_at,
            PurchaseOrderEvent::DraftDeleted(e) => e.occurred_at,
            PurchaseOrderEvent::DeliveryRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::Created(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.status = PurchaseOrderStatus::Draft;
                self.items = e.items.clone();
                self.totals = e.totals;
                self.currency = e.currency.clone();
                self.payment_terms = e.payment_terms.clone();
                self.expected_delivery = e.expected_delivery;
                self.notes = e.notes.clone();
                self.ordered_date = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseOrderEvent::ItemAdded(e) => {
                self.items.push(e.item.clone());
                self.totals = e.totals;
            }
            PurchaseOrderEvent::Sent(_) => {
                self.status = PurchaseOrderStatus::Sent;
            }
            PurchaseOrderEvent::Confirmed(_) => {
                self.status = PurchaseOrderStatus::Confirmed;
            }
            PurchaseOrderEvent::Cancelled(_) => {
                self.status = PurchaseOrderStatus::Cancelled;
            }
            PurchaseOrderEvent::DraftDeleted(_) => {
                self.deleted = true;
            }
            PurchaseOrderEvent::DeliveryRecorded(e) => {
                for line in &e.lines {
                    if let Some(item) =
                        self.items.iter_mut().find(|i| i.product_id == line.product_id)
                    {
                        item.received_quantity = item.received_quantity.saturating_add(line.quantity);
                        if line.notes.is_some() {
                            item.notes = line.notes.clone();
                        }
                    }
                }
                self.status = e.status;
                self.received_by = Some(e.received_by);
                if e.receiving_notes.is_some() {
                    self.receiving_notes = e.receiving_notes.clone();
                }
                if e.actual_delivery.is_some() {
                    self.actual_delivery = e.actual_delivery;
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddItem(cmd) => self.handle_add_item(cmd),
            PurchaseOrderCommand::SendOrder(cmd) => self.handle_send(cmd),
            PurchaseOrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
            PurchaseOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            PurchaseOrderCommand::DeleteDraft(cmd) => self.handle_delete(cmd),
            PurchaseOrderCommand::ReceiveDelivery(cmd) => self.handle_receive(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(order_id)
    }

    fn validate_new_item(item: &NewItem) -> Result<PurchaseOrderItem, DomainError> {
        if item.ordered_quantity == 0 {
            return Err(DomainError::validation(format!(
                "ordered quantity must be positive for product {}",
                item.product_id
            )));
        }
        if item.unit_cost.is_negative() {
            return Err(DomainError::validation(format!(
                "unit cost must not be negative for product {}",
                item.product_id
            )));
        }
        Ok(PurchaseOrderItem {
            product_id: item.product_id,
            ordered_quantity: item.ordered_quantity,
            received_quantity: 0,
            unit_cost: item.unit_cost,
            notes: item.notes.clone(),
        })
    }

    fn subtotal(items: &[PurchaseOrderItem]) -> Result<Money, DomainError> {
        items.iter().try_fold(Money::ZERO, |acc, item| {
            item.unit_cost
                .checked_mul_qty(i64::from(item.ordered_quantity))
                .and_then(|line| acc.checked_add(line))
                .ok_or_else(|| DomainError::validation("order subtotal overflowed"))
        })
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "purchase order must have at least one item",
            ));
        }

        let mut items = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            if items
                .iter()
                .any(|i: &PurchaseOrderItem| i.product_id == item.product_id)
            {
                return Err(DomainError::validation(format!(
                    "duplicate item for product {}",
                    item.product_id
                )));
            }
            items.push(Self::validate_new_item(item)?);
        }

        let subtotal = Self::subtotal(&items)?;
        let totals = Totals::new(subtotal, cmd.tax, cmd.shipping, cmd.discount)?;

        Ok(vec![PurchaseOrderEvent::Created(Created {
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            supplier_id: cmd.supplier_id,
            items,
            totals,
            currency: cmd.currency.clone(),
            payment_terms: cmd.payment_terms.clone(),
            expected_delivery: cmd.expected_delivery,
            notes: cmd.notes.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::conflict(
                "cannot modify purchase order once sent",
            ));
        }
        if self.item(cmd.item.product_id).is_some() {
            return Err(DomainError::validation(format!(
                "duplicate item for product {}",
                cmd.item.product_id
            )));
        }

        let item = Self::validate_new_item(&cmd.item)?;
        let mut items = self.items.clone();
        items.push(item.clone());
        let subtotal = Self::subtotal(&items)?;
        let totals = Totals::new(subtotal, self.totals.tax, self.totals.shipping, self.totals.discount)?;

        Ok(vec![PurchaseOrderEvent::ItemAdded(ItemAdded {
            order_id: cmd.order_id,
            item,
            totals,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_send(&self, cmd: &SendOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "only draft purchase orders can be sent",
            ));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot send purchase order without items",
            ));
        }

        Ok(vec![PurchaseOrderEvent::Sent(Sent {
            order_id: cmd.order_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Sent {
            return Err(DomainError::invariant(
                "only sent purchase orders can be confirmed",
            ));
        }

        Ok(vec![PurchaseOrderEvent::Confirmed(Confirmed {
            order_id: cmd.order_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "cannot cancel purchase order in status {}",
                self.status.as_str()
            )));
        }

        Ok(vec![PurchaseOrderEvent::Cancelled(Cancelled {
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteDraft) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::conflict(
                "only draft purchase orders can be deleted",
            ));
        }

        Ok(vec![PurchaseOrderEvent::DraftDeleted(DraftDeleted {
            order_id: cmd.order_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// All-or-nothing receiving validation.
    ///
    /// Every line is validated before anything is emitted: one bad line fails
    /// the whole call with the complete list of offenses, and no event (so no
    /// stock or ledger change downstream) is produced. Zero-quantity lines
    /// are skipped as no-ops. Cumulative quantities are tracked across
    /// duplicate lines for the same product within one call.
    fn handle_receive(
        &self,
        cmd: &ReceiveDelivery,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if !self.status.is_receivable() {
            return Err(DomainError::invariant(format!(
                "cannot receive against purchase order in status {}",
                self.status.as_str()
            )));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("receiving lines must not be empty"));
        }

        let mut pending: HashMap<ProductId, u32> = HashMap::new();
        let mut accepted: Vec<AcceptedLine> = Vec::new();
        let mut details: Vec<String> = Vec::new();

        for line in &cmd.lines {
            if line.quantity == 0 {
                continue;
            }
            let Some(item) = self.item(line.product_id) else {
                details.push(format!(
                    "product {} is not on purchase order {}",
                    line.product_id, self.order_number
                ));
                continue;
            };

            let already = item.received_quantity + pending.get(&line.product_id).copied().unwrap_or(0);
            // Widened comparison: a pathological line quantity must fail the
            // check, not wrap it.
            if u64::from(already) + u64::from(line.quantity) > u64::from(item.ordered_quantity) {
                details.push(format!(
                    "cannot receive more than ordered quantity for product {}: ordered {}, received {}, attempted {}",
                    line.product_id, item.ordered_quantity, already, line.quantity
                ));
                continue;
            }

            *pending.entry(line.product_id).or_insert(0) += line.quantity;
            accepted.push(AcceptedLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_cost: item.unit_cost,
                notes: line.notes.clone(),
            });
        }

        if !details.is_empty() {
            return Err(DomainError::line_conflicts(details));
        }
        if accepted.is_empty() {
            // Every line was a zero-quantity no-op.
            return Ok(vec![]);
        }

        let fully = self.items.iter().all(|item| {
            item.received_quantity + pending.get(&item.product_id).copied().unwrap_or(0)
                >= item.ordered_quantity
        });
        let status = if fully {
            PurchaseOrderStatus::FullyReceived
        } else {
            PurchaseOrderStatus::PartialReceived
        };
        let actual_delivery = fully.then(|| cmd.actual_delivery_date.unwrap_or(cmd.occurred_at));

        Ok(vec![PurchaseOrderEvent::DeliveryRecorded(DeliveryRecorded {
            order_id: cmd.order_id,
            order_number: self.order_number.clone(),
            lines: accepted,
            status,
            received_by: cmd.received_by,
            receiving_notes: cmd.notes.clone(),
            actual_delivery,
            occurred_at: cmd.occurred_at,
        })])
    }
}
