//! Purchase order receiving orchestration.
//!
//! The aggregate decides which lines are accepted; this engine applies the
//! stock effects. Ordering matters:
//!
//! 1. catalog existence pre-check for every non-zero line (all-or-nothing)
//! 2. dispatch `ReceiveDelivery` — the compare-and-swap append commits the
//!    `DeliveryRecorded` fact, or the whole call fails
//! 3. per accepted line, in caller order: read stock, compute
//!    `new = previous + qty`, write stock, append the ledger entry
//!
//! The stock gate serializes step 1–3 across callers so two concurrent
//! receipts cannot interleave read-modify-write on the same product. Stream
//! concurrency on the order itself is already covered by the append's
//! version check.

use std::sync::{Arc, Mutex};

use backroom_catalog::{CatalogError, ProductCatalog};
use backroom_inventory::{MovementType, StockMovement};
use backroom_purchasing::{
    DeliveryRecorded, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent, ReceiveDelivery,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::purchase_orders::AGGREGATE_TYPE;
use crate::stores::StockLedger;

pub struct ReceivingEngine<S> {
    dispatcher: Arc<CommandDispatcher<S>>,
    catalog: Arc<dyn ProductCatalog>,
    ledger: Arc<dyn StockLedger>,
    stock_gate: Mutex<()>,
}

impl<S> ReceivingEngine<S>
where
    S: EventStore,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S>>,
        catalog: Arc<dyn ProductCatalog>,
        ledger: Arc<dyn StockLedger>,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
            ledger,
            stock_gate: Mutex::new(()),
        }
    }

    /// Reconcile a supplier delivery against a purchase order.
    ///
    /// Returns the updated order and the ledger entries created by this call.
    /// Any line failure rejects the whole call with nothing committed.
    pub fn receive(
        &self,
        cmd: ReceiveDelivery,
    ) -> Result<(PurchaseOrder, Vec<StockMovement>), DispatchError> {
        let _gate = self
            .stock_gate
            .lock()
            .map_err(|_| DispatchError::Dependency("stock gate poisoned".to_string()))?;

        // Catalog pre-check: every non-zero line must name a known product.
        let mut missing = Vec::new();
        for line in &cmd.lines {
            if line.quantity == 0 {
                continue;
            }
            match self.catalog.exists(line.product_id) {
                Ok(true) => {}
                Ok(false) => missing.push(format!(
                    "product {} does not exist in the catalog",
                    line.product_id
                )),
                Err(e) => return Err(DispatchError::Dependency(e.to_string())),
            }
        }
        if !missing.is_empty() {
            return Err(DispatchError::LineConflicts { details: missing });
        }

        let order_id = cmd.order_id;
        let committed = self.dispatcher.dispatch(
            order_id.0,
            AGGREGATE_TYPE,
            PurchaseOrderCommand::ReceiveDelivery(cmd),
            |id| PurchaseOrder::empty(backroom_purchasing::PurchaseOrderId::new(id)),
        )?;

        let mut movements = Vec::new();
        for stored in &committed {
            let event: PurchaseOrderEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            if let PurchaseOrderEvent::DeliveryRecorded(delivery) = event {
                movements.extend(self.apply_stock(&delivery)?);
            }
        }

        let order = self
            .dispatcher
            .rehydrate(order_id.0, |id| {
                PurchaseOrder::empty(backroom_purchasing::PurchaseOrderId::new(id))
            })?;

        Ok((order, movements))
    }

    fn apply_stock(
        &self,
        delivery: &DeliveryRecorded,
    ) -> Result<Vec<StockMovement>, DispatchError> {
        let mut movements = Vec::with_capacity(delivery.lines.len());

        for line in &delivery.lines {
            let previous = self
                .catalog
                .stock(line.product_id)
                .map_err(catalog_failure)?;
            let new = previous.checked_add(line.quantity).ok_or_else(|| {
                DispatchError::InvariantViolation(format!(
                    "stock overflow for product {}",
                    line.product_id
                ))
            })?;
            self.catalog
                .set_stock(line.product_id, new)
                .map_err(catalog_failure)?;

            let notes = match &line.notes {
                Some(n) => format!("received against {}: {n}", delivery.order_number),
                None => format!("received against {}", delivery.order_number),
            };
            let movement = StockMovement::new(
                line.product_id,
                MovementType::Purchase,
                i64::from(line.quantity),
                previous,
                new,
                line.unit_cost,
                delivery.order_number.clone(),
                Some(notes),
                delivery.received_by,
                delivery.occurred_at,
            )
            .map_err(DispatchError::from)?;

            self.ledger
                .append(movement.clone())
                .map_err(DispatchError::from)?;
            movements.push(movement);
        }

        Ok(movements)
    }
}

fn catalog_failure(err: CatalogError) -> DispatchError {
    DispatchError::Dependency(err.to_string())
}
