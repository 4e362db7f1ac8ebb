use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use backroom_core::{AggregateId, Totals, UserId};
use backroom_events::{EventEnvelope, EventSink, SinkError};
use backroom_purchasing::{
    PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderItem, PurchaseOrderStatus, SupplierId,
};

use crate::projections::ProjectionError;
use crate::read_model::ReadModelStore;

pub const AGGREGATE_TYPE: &str = "purchasing.order";

/// Flat purchase order view for list/get queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReadModel {
    pub order_id: PurchaseOrderId,
    pub order_number: String,
    pub supplier_id: SupplierId,
    pub status: PurchaseOrderStatus,
    pub items: Vec<PurchaseOrderItem>,
    pub totals: Totals,
    pub currency: String,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub ordered_date: DateTime<Utc>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub received_by: Option<UserId>,
    pub receiving_notes: Option<String>,
}

pub struct PurchaseOrdersProjection<S>
where
    S: ReadModelStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> PurchaseOrdersProjection<S>
where
    S: ReadModelStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, order_id: &PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<PurchaseOrderReadModel> {
        let mut all = self.store.list();
        all.sort_by(|a, b| b.ordered_date.cmp(&a.ordered_date));
        all
    }

    fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.cursor(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::SequenceGap { last, found: seq });
        }
        // Already applied (re-delivery): idempotent skip.
        if seq <= last {
            return Ok(());
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::SequenceGap { last, found: seq });
        }

        let ev: PurchaseOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            PurchaseOrderEvent::Created(e) => {
                if e.order_id.0 != aggregate_id {
                    return Err(ProjectionError::Mismatch(
                        "event order_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    e.order_id,
                    PurchaseOrderReadModel {
                        order_id: e.order_id,
                        order_number: e.order_number,
                        supplier_id: e.supplier_id,
                        status: PurchaseOrderStatus::Draft,
                        items: e.items,
                        totals: e.totals,
                        currency: e.currency,
                        payment_terms: e.payment_terms,
                        notes: e.notes,
                        ordered_date: e.occurred_at,
                        expected_delivery: e.expected_delivery,
                        actual_delivery: None,
                        received_by: None,
                        receiving_notes: None,
                    },
                );
            }
            PurchaseOrderEvent::ItemAdded(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.items.push(e.item);
                    rm.totals = e.totals;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::Sent(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = PurchaseOrderStatus::Sent;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::Confirmed(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = PurchaseOrderStatus::Confirmed;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::Cancelled(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = PurchaseOrderStatus::Cancelled;
                    self.store.upsert(e.order_id, rm);
                }
            }
            PurchaseOrderEvent::DraftDeleted(e) => {
                self.store.remove(&e.order_id);
            }
            PurchaseOrderEvent::DeliveryRecorded(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    for line in &e.lines {
                        if let Some(item) =
                            rm.items.iter_mut().find(|i| i.product_id == line.product_id)
                        {
                            item.received_quantity =
                                item.received_quantity.saturating_add(line.quantity);
                            if line.notes.is_some() {
                                item.notes = line.notes.clone();
                            }
                        }
                    }
                    rm.status = e.status;
                    rm.received_by = Some(e.received_by);
                    if e.receiving_notes.is_some() {
                        rm.receiving_notes = e.receiving_notes;
                    }
                    if e.actual_delivery.is_some() {
                        rm.actual_delivery = e.actual_delivery;
                    }
                    self.store.upsert(e.order_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}

impl<S> EventSink for PurchaseOrdersProjection<S>
where
    S: ReadModelStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    fn name(&self) -> &'static str {
        "projections.purchase_orders"
    }

    fn accept(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), SinkError> {
        self.apply_envelope(envelope)
            .map_err(|e| SinkError::new(self.name(), e.to_string()))
    }
}
