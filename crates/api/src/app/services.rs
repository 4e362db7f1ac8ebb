//! Infrastructure wiring behind the HTTP handlers.
//!
//! One in-memory backend: the event store is the source of truth, projections
//! and the audit trail hang off the dispatcher as synchronous sinks so reads
//! observe their own writes.

use std::sync::Arc;

use chrono::Utc;

use backroom_catalog::ProductId;
use backroom_events::EventSink;
use backroom_infra::audit::AuditTrail;
use backroom_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use backroom_infra::event_store::InMemoryEventStore;
use backroom_infra::numbering::DocumentNumbers;
use backroom_infra::projections::{
    OrderReadModel, OrdersProjection, PurchaseOrderReadModel, PurchaseOrdersProjection,
};
use backroom_infra::read_model::InMemoryReadModelStore;
use backroom_infra::services::{FulfillmentService, ReceivingEngine};
use backroom_infra::stores::{
    InMemoryProductCatalog, InMemorySaleStore, InMemoryStockLedger, SaleStore, StockLedger,
};
use backroom_inventory::StockMovement;
use backroom_orders::OrderId;
use backroom_purchasing::PurchaseOrderId;
use backroom_sales::Sale;

type Store = Arc<InMemoryEventStore>;
type PoProjection =
    PurchaseOrdersProjection<Arc<InMemoryReadModelStore<PurchaseOrderId, PurchaseOrderReadModel>>>;
type SoProjection = OrdersProjection<Arc<InMemoryReadModelStore<OrderId, OrderReadModel>>>;

pub struct AppServices {
    dispatcher: Arc<CommandDispatcher<Store>>,
    catalog: Arc<InMemoryProductCatalog>,
    ledger: Arc<InMemoryStockLedger>,
    sales: Arc<InMemorySaleStore>,
    po_projection: Arc<PoProjection>,
    orders_projection: Arc<SoProjection>,
    numbers: DocumentNumbers,
    receiving: ReceivingEngine<Store>,
    fulfillment: FulfillmentService<Store>,
}

impl AppServices {
    pub fn in_memory() -> Self {
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
                .with_sink(audit as Arc<dyn EventSink>),
        );

        let receiving = ReceivingEngine::new(
            Arc::clone(&dispatcher),
            Arc::clone(&catalog) as _,
            Arc::clone(&ledger) as _,
        );
        let fulfillment = FulfillmentService::new(Arc::clone(&dispatcher), Arc::clone(&sales) as _);

        Self {
            dispatcher,
            catalog,
            ledger,
            sales,
            po_projection,
            orders_projection,
            numbers: DocumentNumbers::new(),
            receiving,
            fulfillment,
        }
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher<Store>> {
        &self.dispatcher
    }

    /// Catalog handle, also used by tests to seed products.
    pub fn catalog(&self) -> &Arc<InMemoryProductCatalog> {
        &self.catalog
    }

    pub fn receiving(&self) -> &ReceivingEngine<Store> {
        &self.receiving
    }

    pub fn fulfillment(&self) -> &FulfillmentService<Store> {
        &self.fulfillment
    }

    /// Allocate the next document number for `prefix`, scoped to today.
    pub fn next_number(&self, prefix: &str) -> Result<String, DispatchError> {
        self.numbers
            .next(prefix, Utc::now().date_naive())
            .map_err(|e| DispatchError::Dependency(e.to_string()))
    }

    pub fn purchase_order_get(&self, order_id: &PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.po_projection.get(order_id)
    }

    pub fn purchase_orders_list(&self) -> Vec<PurchaseOrderReadModel> {
        self.po_projection.list()
    }

    pub fn order_get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.orders_projection.get(order_id)
    }

    pub fn orders_list(&self) -> Vec<OrderReadModel> {
        self.orders_projection.list()
    }

    pub fn movements(
        &self,
        product_id: Option<ProductId>,
        reference: Option<&str>,
    ) -> Vec<StockMovement> {
        self.ledger.query(product_id, reference)
    }

    pub fn sale(&self, order_number: &str) -> Option<Sale> {
        self.sales.get(order_number)
    }
}
