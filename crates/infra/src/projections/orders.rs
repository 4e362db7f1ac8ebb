use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use backroom_core::{AggregateId, Totals, UserId};
use backroom_events::{EventEnvelope, EventSink, SinkError};
use backroom_orders::{OrderEvent, OrderId, OrderItem, OrderStatus, StatusEntry};

use crate::projections::ProjectionError;
use crate::read_model::ReadModelStore;

pub const AGGREGATE_TYPE: &str = "orders.order";

/// Flat sales order view for list/get queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub totals: Totals,
    pub status_history: Vec<StatusEntry>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub assigned_to: Option<UserId>,
    pub packed_by: Option<UserId>,
    pub shipped_by: Option<UserId>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub packed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<OrderReadModel> {
        let mut all = self.store.list();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
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

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            OrderEvent::Created(e) => {
                if e.order_id.0 != aggregate_id {
                    return Err(ProjectionError::Mismatch(
                        "event order_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    e.order_id,
                    OrderReadModel {
                        order_id: e.order_id,
                        order_number: e.order_number,
                        customer_name: e.customer.name,
                        status: OrderStatus::Pending,
                        items: e.items,
                        totals: e.totals,
                        status_history: vec![StatusEntry {
                            status: OrderStatus::Pending,
                            at: e.occurred_at,
                            notes: None,
                            actor: e.actor,
                        }],
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
                        created_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::StatusChanged(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = e.status;
                    rm.status_history.push(StatusEntry {
                        status: e.status,
                        at: e.occurred_at,
                        notes: e.notes,
                        actor: e.actor,
                    });
                    match e.status {
                        OrderStatus::Confirmed => {
                            rm.confirmed_at.get_or_insert(e.occurred_at);
                        }
                        OrderStatus::Packed => {
                            rm.packed_at.get_or_insert(e.occurred_at);
                            rm.packed_by = Some(e.actor);
                        }
                        OrderStatus::Shipped => {
                            rm.shipped_at.get_or_insert(e.occurred_at);
                            rm.shipped_by = Some(e.actor);
                        }
                        OrderStatus::Delivered => {
                            rm.delivered_at.get_or_insert(e.occurred_at);
                            rm.actual_delivery.get_or_insert(e.occurred_at);
                        }
                        _ => {}
                    }
                    if e.tracking_number.is_some() {
                        rm.tracking_number = e.tracking_number;
                    }
                    if e.estimated_delivery.is_some() {
                        rm.estimated_delivery = e.estimated_delivery;
                    }
                    if e.assigned_to.is_some() {
                        rm.assigned_to = e.assigned_to;
                    }
                    self.store.upsert(e.order_id, rm);
                }
            }
            OrderEvent::Cancelled(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = OrderStatus::Cancelled;
                    rm.status_history.push(StatusEntry {
                        status: OrderStatus::Cancelled,
                        at: e.occurred_at,
                        notes: Some(e.reason),
                        actor: e.actor,
                    });
                    self.store.upsert(e.order_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}

impl<S> EventSink for OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    fn name(&self) -> &'static str {
        "projections.orders"
    }

    fn accept(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), SinkError> {
        self.apply_envelope(envelope)
            .map_err(|e| SinkError::new(self.name(), e.to_string()))
    }
}
