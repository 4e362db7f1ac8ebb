//! End-to-end wiring tests: dispatcher, projections, receiving engine,
//! fulfillment service, ledger, and sale conversion working together.

use std::sync::Arc;

use chrono::Utc;

use backroom_catalog::{Product, ProductId};
use backroom_core::{AggregateId, Money, UserId};
use backroom_events::EventSink;
use backroom_orders::{
    CancelOrder, CreateOrder, Customer, NewOrderItem, Order, OrderCommand, OrderId, OrderStatus,
    PaymentInfo, PaymentStatus, UpdateStatus,
};
use backroom_purchasing::{
    CreatePurchaseOrder, NewItem, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId,
    PurchaseOrderStatus, ReceiveDelivery, ReceivingLine, SendOrder, SupplierId,
};

use crate::audit::AuditTrail;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::InMemoryEventStore;
use crate::projections::{
    OrderReadModel, OrdersProjection, PurchaseOrderReadModel, PurchaseOrdersProjection,
};
use crate::read_model::InMemoryReadModelStore;
use crate::services::{FulfillmentService, ReceivingEngine};
use crate::stores::{InMemoryProductCatalog, InMemorySaleStore, InMemoryStockLedger, SaleStore, StockLedger};

type Store = Arc<InMemoryEventStore>;
type PoProjection =
    PurchaseOrdersProjection<Arc<InMemoryReadModelStore<PurchaseOrderId, PurchaseOrderReadModel>>>;
type SoProjection = OrdersProjection<Arc<InMemoryReadModelStore<OrderId, OrderReadModel>>>;

struct Harness {
    dispatcher: Arc<CommandDispatcher<Store>>,
    catalog: Arc<InMemoryProductCatalog>,
    ledger: Arc<InMemoryStockLedger>,
    sales: Arc<InMemorySaleStore>,
    po_projection: Arc<PoProjection>,
    orders_projection: Arc<SoProjection>,
    audit: Arc<AuditTrail>,
    receiving: ReceivingEngine<Store>,
    fulfillment: FulfillmentService<Store>,
    actor: UserId,
}

fn harness() -> Harness {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let catalog = Arc::new(InMemoryProductCatalog::new());
    let ledger = Arc::new(InMemoryStockLedger::new());
    let sales = Arc::new(InMemorySaleStore::new());
    let audit = Arc::new(AuditTrail::new());

    let po_projection = Arc::new(PurchaseOrdersProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));
    let orders_projection = Arc::new(OrdersProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));

    let dispatcher = Arc::new(
        CommandDispatcher::new(store)
            .with_sink(Arc::clone(&po_projection) as Arc<dyn EventSink>)
            .with_sink(Arc::clone(&orders_projection) as Arc<dyn EventSink>)
            .with_sink(Arc::clone(&audit) as Arc<dyn EventSink>),
    );

    let receiving = ReceivingEngine::new(
        Arc::clone(&dispatcher),
        Arc::clone(&catalog) as _,
        Arc::clone(&ledger) as _,
    );
    let fulfillment = FulfillmentService::new(Arc::clone(&dispatcher), Arc::clone(&sales) as _);

    Harness {
        dispatcher,
        catalog,
        ledger,
        sales,
        po_projection,
        orders_projection,
        audit,
        receiving,
        fulfillment,
        actor: UserId::new(),
    }
}

impl Harness {
    fn seed_product(&self, stock: u32) -> ProductId {
        let id = ProductId::new(AggregateId::new());
        self.catalog.insert(Product {
            id,
            name: format!("product {id}"),
            stock_quantity: stock,
        });
        id
    }

    fn create_sent_po(&self, product_id: ProductId, ordered: u32, unit_cost: i64) -> PurchaseOrderId {
        let order_id = PurchaseOrderId::new(AggregateId::new());
        self.dispatcher
            .dispatch(
                order_id.0,
                crate::projections::purchase_orders::AGGREGATE_TYPE,
                PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                    order_id,
                    order_number: "PO-20260827-0001".to_string(),
                    supplier_id: SupplierId::new(AggregateId::new()),
                    items: vec![NewItem {
                        product_id,
                        ordered_quantity: ordered,
                        unit_cost: Money::from_minor(unit_cost),
                        notes: None,
                    }],
                    currency: "USD".to_string(),
                    payment_terms: None,
                    tax: Money::ZERO,
                    shipping: Money::ZERO,
                    discount: Money::ZERO,
                    expected_delivery: None,
                    notes: None,
                    actor: self.actor,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();
        self.dispatcher
            .dispatch(
                order_id.0,
                crate::projections::purchase_orders::AGGREGATE_TYPE,
                PurchaseOrderCommand::SendOrder(SendOrder {
                    order_id,
                    actor: self.actor,
                    occurred_at: Utc::now(),
                }),
                |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
            )
            .unwrap();
        order_id
    }

    fn receive(
        &self,
        order_id: PurchaseOrderId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(PurchaseOrder, Vec<backroom_inventory::StockMovement>), DispatchError> {
        self.receiving.receive(ReceiveDelivery {
            order_id,
            lines: vec![ReceivingLine {
                product_id,
                quantity,
                notes: None,
            }],
            received_by: self.actor,
            notes: None,
            actual_delivery_date: None,
            occurred_at: Utc::now(),
        })
    }

    fn create_pending_order(&self) -> OrderId {
        let order_id = OrderId::new(AggregateId::new());
        self.dispatcher
            .dispatch(
                order_id.0,
                crate::projections::orders::AGGREGATE_TYPE,
                OrderCommand::CreateOrder(CreateOrder {
                    order_id,
                    order_number: "ORD-20260827-0001".to_string(),
                    customer: Customer {
                        name: "Ada Lovelace".to_string(),
                        email: None,
                        phone: None,
                    },
                    items: vec![NewOrderItem {
                        product_id: ProductId::new(AggregateId::new()),
                        quantity: 2,
                        unit_price: Money::from_minor(1500),
                    }],
                    tax: Money::from_minor(240),
                    shipping: Money::ZERO,
                    discount: Money::ZERO,
                    shipping_address: None,
                    payment: PaymentInfo {
                        method: "card".to_string(),
                        reference: None,
                        amount: Money::from_minor(3240),
                        status: PaymentStatus::Pending,
                    },
                    actor: self.actor,
                    occurred_at: Utc::now(),
                }),
                |id| Order::empty(OrderId::new(id)),
            )
            .unwrap();
        order_id
    }

    fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(Order, Option<backroom_sales::Sale>), DispatchError> {
        self.fulfillment.update_status(UpdateStatus {
            order_id,
            status,
            notes: None,
            tracking_number: None,
            estimated_delivery: None,
            assigned_to: None,
            actor: self.actor,
            occurred_at: Utc::now(),
        })
    }
}

#[test]
fn partial_then_full_receipt_updates_stock_ledger_and_read_model() {
    let h = harness();
    let product = h.seed_product(0);
    let po = h.create_sent_po(product, 20, 200);

    let (order, movements) = h.receive(po, product, 15).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::PartialReceived);
    assert_eq!(order.items()[0].received_quantity, 15);
    assert_eq!(h.catalog.get(product).unwrap().stock_quantity, 15);
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].quantity, 15);
    assert_eq!(movements[0].previous_stock, 0);
    assert_eq!(movements[0].new_stock, 15);
    assert_eq!(movements[0].total_value, Money::from_minor(3000));
    assert_eq!(movements[0].reference, "PO-20260827-0001");

    let (order, movements) = h.receive(po, product, 5).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::FullyReceived);
    assert_eq!(order.items()[0].received_quantity, 20);
    assert!(order.actual_delivery().is_some());
    assert_eq!(h.catalog.get(product).unwrap().stock_quantity, 20);
    assert_eq!(movements.len(), 1);

    // Projection observed the same sequence synchronously.
    let rm = h.po_projection.get(&po).unwrap();
    assert_eq!(rm.status, PurchaseOrderStatus::FullyReceived);
    assert_eq!(rm.items[0].received_quantity, 20);

    assert_eq!(h.ledger.query(Some(product), None).len(), 2);
}

#[test]
fn over_receive_commits_nothing() {
    let h = harness();
    let product = h.seed_product(7);
    let po = h.create_sent_po(product, 20, 200);

    let err = h.receive(po, product, 25).unwrap_err();
    assert!(matches!(err, DispatchError::LineConflicts { .. }));

    // No stock change, no ledger entry, order untouched.
    assert_eq!(h.catalog.get(product).unwrap().stock_quantity, 7);
    assert!(h.ledger.query(Some(product), None).is_empty());
    let rm = h.po_projection.get(&po).unwrap();
    assert_eq!(rm.status, PurchaseOrderStatus::Sent);
    assert_eq!(rm.items[0].received_quantity, 0);
}

#[test]
fn receiving_unknown_catalog_product_is_rejected_before_dispatch() {
    let h = harness();
    let product = h.seed_product(0);
    let po = h.create_sent_po(product, 10, 100);

    let ghost = ProductId::new(AggregateId::new());
    let err = h
        .receiving
        .receive(ReceiveDelivery {
            order_id: po,
            lines: vec![ReceivingLine {
                product_id: ghost,
                quantity: 1,
                notes: None,
            }],
            received_by: h.actor,
            notes: None,
            actual_delivery_date: None,
            occurred_at: Utc::now(),
        })
        .unwrap_err();

    match err {
        DispatchError::LineConflicts { details } => {
            assert!(details[0].contains("does not exist in the catalog"));
        }
        other => panic!("expected LineConflicts, got {other:?}"),
    }
    let rm = h.po_projection.get(&po).unwrap();
    assert_eq!(rm.items[0].received_quantity, 0);
}

#[test]
fn delivered_order_converts_to_exactly_one_sale() {
    let h = harness();
    let order_id = h.create_pending_order();

    let (order, sale) = h.update_status(order_id, OrderStatus::Confirmed).unwrap();
    assert_eq!(order.status(), OrderStatus::Confirmed);
    assert!(sale.is_none());

    let (order, sale) = h.update_status(order_id, OrderStatus::Delivered).unwrap();
    let sale = sale.expect("delivery must produce a sale");
    assert_eq!(sale.order_number, "ORD-20260827-0001");
    assert_eq!(sale.sale_number, "SALE-20260827-0001");
    assert_eq!(
        sale.total_amount().unwrap(),
        order.totals().total().unwrap()
    );
    assert_eq!(Some(sale.sale_date), order.actual_delivery());

    // Converting again returns the same sale, not a second one.
    let again = h.fulfillment.convert(&order, h.actor).unwrap();
    assert_eq!(again, sale);
    assert_eq!(h.sales.list().len(), 1);
}

#[test]
fn cancelling_a_delivered_order_is_rejected() {
    let h = harness();
    let order_id = h.create_pending_order();
    h.update_status(order_id, OrderStatus::Delivered).unwrap();

    let err = h
        .fulfillment
        .cancel(CancelOrder {
            order_id,
            reason: "too late".to_string(),
            actor: h.actor,
            occurred_at: Utc::now(),
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::Conflict(_)));
}

#[test]
fn order_read_model_tracks_history_and_milestones() {
    let h = harness();
    let order_id = h.create_pending_order();
    h.update_status(order_id, OrderStatus::Confirmed).unwrap();
    h.update_status(order_id, OrderStatus::Packed).unwrap();
    h.update_status(order_id, OrderStatus::Shipped).unwrap();

    let rm = h.orders_projection.get(&order_id).unwrap();
    assert_eq!(rm.status, OrderStatus::Shipped);
    assert_eq!(rm.status_history.len(), 4);
    assert_eq!(rm.status_history.last().unwrap().status, OrderStatus::Shipped);
    assert!(rm.confirmed_at.is_some());
    assert!(rm.packed_at.is_some());
    assert!(rm.shipped_at.is_some());
    assert!(rm.packed_by.is_some());
    assert!(rm.delivered_at.is_none());
}

#[test]
fn audit_trail_records_every_committed_event() {
    let h = harness();
    let product = h.seed_product(0);
    let po = h.create_sent_po(product, 10, 100);
    h.receive(po, product, 10).unwrap();

    let records = h.audit.records();
    // created, sent, delivery_recorded
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.aggregate_id == po.0));
    assert_eq!(records[2].sequence_number, 3);
}

#[test]
fn projections_ignore_redelivered_envelopes() {
    let h = harness();
    let product = h.seed_product(0);
    let po = h.create_sent_po(product, 10, 100);

    let history = h.dispatcher.rehydrate(po.0, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    });
    assert!(history.is_ok());

    // Re-feed the audit trail's copy of the stream into the projection.
    for record in h.audit.records() {
        let envelope = backroom_events::EventEnvelope::new(
            record.event_id,
            record.aggregate_id,
            record.aggregate_type.clone(),
            record.sequence_number,
            record.payload.clone(),
        );
        h.po_projection.apply_envelope(&envelope).unwrap();
    }

    let rm = h.po_projection.get(&po).unwrap();
    assert_eq!(rm.status, PurchaseOrderStatus::Sent);
    assert_eq!(rm.items.len(), 1);
}
