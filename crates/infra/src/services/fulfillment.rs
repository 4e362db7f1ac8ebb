//! Order fulfillment orchestration.
//!
//! Status changes go through the dispatcher (append with version check);
//! when a change lands on `delivered`, sale conversion runs synchronously
//! afterwards. If conversion fails the order stays delivered and the caller
//! gets a dependency error — retry by calling [`FulfillmentService::convert`]
//! again, not by repeating the transition.

use std::sync::Arc;

use chrono::Utc;

use backroom_core::UserId;
use backroom_orders::{CancelOrder, Order, OrderCommand, OrderId, OrderStatus, UpdateStatus};
use backroom_sales::Sale;

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::orders::AGGREGATE_TYPE;
use crate::stores::SaleStore;

pub struct FulfillmentService<S> {
    dispatcher: Arc<CommandDispatcher<S>>,
    sales: Arc<dyn SaleStore>,
}

impl<S> FulfillmentService<S>
where
    S: EventStore,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S>>, sales: Arc<dyn SaleStore>) -> Self {
        Self { dispatcher, sales }
    }

    /// Apply one fulfillment transition; on `delivered`, convert to a sale.
    ///
    /// Returns the updated order and the sale when this call delivered it.
    pub fn update_status(
        &self,
        cmd: UpdateStatus,
    ) -> Result<(Order, Option<Sale>), DispatchError> {
        let order_id = cmd.order_id;
        let actor = cmd.actor;

        self.dispatcher.dispatch(
            order_id.0,
            AGGREGATE_TYPE,
            OrderCommand::UpdateStatus(cmd),
            |id| Order::empty(OrderId::new(id)),
        )?;

        let order = self.rehydrate(order_id)?;

        if order.status() == OrderStatus::Delivered {
            let sale = self.convert(&order, actor)?;
            return Ok((order, Some(sale)));
        }
        Ok((order, None))
    }

    pub fn cancel(&self, cmd: CancelOrder) -> Result<Order, DispatchError> {
        let order_id = cmd.order_id;
        self.dispatcher.dispatch(
            order_id.0,
            AGGREGATE_TYPE,
            OrderCommand::CancelOrder(cmd),
            |id| Order::empty(OrderId::new(id)),
        )?;
        self.rehydrate(order_id)
    }

    /// Materialize the sale for a delivered order, at most once per order
    /// number. Calling again returns the existing sale unchanged.
    pub fn convert(&self, order: &Order, actor: UserId) -> Result<Sale, DispatchError> {
        if let Some(existing) = self.sales.get(order.order_number()) {
            return Ok(existing);
        }
        let sale = Sale::from_order(order, actor, Utc::now())?;
        self.sales
            .insert_if_absent(sale)
            .map_err(|e| DispatchError::Dependency(e.to_string()))
    }

    pub fn rehydrate(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        self.dispatcher
            .rehydrate(order_id.0, |id| Order::empty(OrderId::new(id)))
    }
}
