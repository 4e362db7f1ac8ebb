use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use backroom_catalog::{ProductCatalog, ProductId};
use backroom_core::{docnum, AggregateId, Money};
use backroom_infra::command_dispatcher::DispatchError;
use backroom_infra::projections::purchase_orders::AGGREGATE_TYPE;
use backroom_purchasing::{
    AddItem, CancelOrder, ConfirmOrder, CreatePurchaseOrder, DeleteDraft, NewItem, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderId, ReceiveDelivery, ReceivingLine, SendOrder, SupplierId,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().nest("/orders", orders_router())
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route("/:id", get(get_purchase_order).delete(delete_draft))
        .route("/:id/items", post(add_item))
        .route("/:id/send", post(send_order))
        .route("/:id/confirm", post(confirm_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/receive", post(receive_delivery))
}

fn parse_order_id(id: &str) -> Result<PurchaseOrderId, axum::response::Response> {
    id.parse::<AggregateId>()
        .map(PurchaseOrderId::new)
        .map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid purchase order id")
        })
}

fn parse_items(
    items: Vec<dto::PurchaseOrderItemRequest>,
) -> Result<Vec<NewItem>, axum::response::Response> {
    items
        .into_iter()
        .map(|item| {
            let product_agg: AggregateId = item.product_id.parse().map_err(|_| {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
            })?;
            Ok(NewItem {
                product_id: ProductId::new(product_agg),
                ordered_quantity: item.quantity,
                unit_cost: Money::from_minor(item.unit_cost),
                notes: item.notes,
            })
        })
        .collect()
}

/// Every item must name a known product before the order is even drafted,
/// matching the existence check the receiving path runs per line.
fn ensure_products_exist(
    services: &AppServices,
    items: &[NewItem],
) -> Result<(), axum::response::Response> {
    let mut missing = Vec::new();
    for item in items {
        match services.catalog().exists(item.product_id) {
            Ok(true) => {}
            Ok(false) => missing.push(format!(
                "product {} does not exist in the catalog",
                item.product_id
            )),
            Err(e) => {
                return Err(errors::dispatch_error_to_response(DispatchError::Dependency(
                    e.to_string(),
                )))
            }
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(errors::dispatch_error_to_response(
            DispatchError::LineConflicts { details: missing },
        ))
    }
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> axum::response::Response {
    let supplier_agg: AggregateId = match body.supplier_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid supplier_id")
        }
    };

    let items = match parse_items(body.items) {
        Ok(items) => items,
        Err(res) => return res,
    };
    if let Err(res) = ensure_products_exist(&services, &items) {
        return res;
    }

    let order_number = match services.next_number(docnum::PURCHASE_ORDER_PREFIX) {
        Ok(n) => n,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let order_agg = AggregateId::new();
    let order_id = PurchaseOrderId::new(order_agg);
    let cmd = PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
        order_id,
        order_number,
        supplier_id: SupplierId::new(supplier_agg),
        items,
        currency: body.currency.unwrap_or_else(|| "USD".to_string()),
        payment_terms: body.payment_terms,
        tax: Money::from_minor(body.tax),
        shipping: Money::from_minor(body.shipping),
        discount: Money::from_minor(body.discount),
        expected_delivery: body.expected_delivery,
        notes: body.notes,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatcher().dispatch(order_agg, AGGREGATE_TYPE, cmd, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }

    match services.purchase_order_get(&order_id) {
        Some(rm) => (StatusCode::CREATED, Json(dto::purchase_order_to_json(rm))).into_response(),
        None => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "projection_lag",
            "purchase order not visible after create",
        ),
    }
}

pub async fn list_purchase_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .purchase_orders_list()
        .into_iter()
        .map(dto::purchase_order_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.purchase_order_get(&order_id) {
        Some(rm) => (StatusCode::OK, Json(dto::purchase_order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found"),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PurchaseOrderItemRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let mut items = match parse_items(vec![body]) {
        Ok(items) => items,
        Err(res) => return res,
    };
    if let Err(res) = ensure_products_exist(&services, &items) {
        return res;
    }
    let item = items.remove(0);

    let cmd = PurchaseOrderCommand::AddItem(AddItem {
        order_id,
        item,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_and_return(&services, order_id, cmd)
}

pub async fn send_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let cmd = PurchaseOrderCommand::SendOrder(SendOrder {
        order_id,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_and_return(&services, order_id, cmd)
}

pub async fn confirm_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let cmd = PurchaseOrderCommand::ConfirmOrder(ConfirmOrder {
        order_id,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_and_return(&services, order_id, cmd)
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let cmd = PurchaseOrderCommand::CancelOrder(CancelOrder {
        order_id,
        reason: body.reason,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_and_return(&services, order_id, cmd)
}

pub async fn delete_draft(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let cmd = PurchaseOrderCommand::DeleteDraft(DeleteDraft {
        order_id,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    });
    if let Err(e) = services.dispatcher().dispatch(order_id.0, AGGREGATE_TYPE, cmd, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }
    StatusCode::NO_CONTENT.into_response()
}

pub async fn receive_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveDeliveryRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in body.lines {
        let product_agg: AggregateId = match line.product_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
            }
        };
        lines.push(ReceivingLine {
            product_id: ProductId::new(product_agg),
            quantity: line.quantity,
            notes: line.notes,
        });
    }

    let cmd = ReceiveDelivery {
        order_id,
        lines,
        received_by: actor.actor(),
        notes: body.notes,
        actual_delivery_date: body.actual_delivery_date,
        occurred_at: Utc::now(),
    };

    let movements = match services.receiving().receive(cmd) {
        Ok((_, movements)) => movements,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    match services.purchase_order_get(&order_id) {
        Some(rm) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "order": dto::purchase_order_to_json(rm),
                "movements": movements.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found"),
    }
}

fn dispatch_and_return(
    services: &AppServices,
    order_id: PurchaseOrderId,
    cmd: PurchaseOrderCommand,
) -> axum::response::Response {
    if let Err(e) = services.dispatcher().dispatch(order_id.0, AGGREGATE_TYPE, cmd, |id| {
        PurchaseOrder::empty(PurchaseOrderId::new(id))
    }) {
        return errors::dispatch_error_to_response(e);
    }
    match services.purchase_order_get(&order_id) {
        Some(rm) => (StatusCode::OK, Json(dto::purchase_order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found"),
    }
}
