use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use backroom_catalog::ProductId;
use backroom_core::{docnum, AggregateId, Money, UserId};
use backroom_infra::projections::orders::AGGREGATE_TYPE;
use backroom_orders::{
    CancelOrder, CreateOrder, Customer, NewOrderItem, Order, OrderCommand, OrderId, OrderStatus,
    PaymentInfo, PaymentStatus, ShippingAddress, UpdateStatus,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", post(update_status))
        .route("/:id/cancel", post(cancel_order))
}

fn parse_order_id(id: &str) -> Result<OrderId, axum::response::Response> {
    id.parse::<AggregateId>().map(OrderId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
    })
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let product_agg: AggregateId = match item.product_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
            }
        };
        items.push(NewOrderItem {
            product_id: ProductId::new(product_agg),
            quantity: item.quantity,
            unit_price: Money::from_minor(item.unit_price),
        });
    }

    let order_number = match services.next_number(docnum::SALES_ORDER_PREFIX) {
        Ok(n) => n,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let order_agg = AggregateId::new();
    let order_id = OrderId::new(order_agg);
    let cmd = OrderCommand::CreateOrder(CreateOrder {
        order_id,
        order_number,
        customer: Customer {
            name: body.customer.name,
            email: body.customer.email,
            phone: body.customer.phone,
        },
        items,
        tax: Money::from_minor(body.tax),
        shipping: Money::from_minor(body.shipping),
        discount: Money::from_minor(body.discount),
        shipping_address: body.shipping_address.map(|addr| ShippingAddress {
            line1: addr.line1,
            line2: addr.line2,
            city: addr.city,
            postal_code: addr.postal_code,
            country: addr.country,
        }),
        payment: PaymentInfo {
            method: body.payment.method,
            reference: body.payment.reference,
            amount: Money::from_minor(body.payment.amount),
            status: PaymentStatus::Pending,
        },
        actor: actor.actor(),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services
        .dispatcher()
        .dispatch(order_agg, AGGREGATE_TYPE, cmd, |id| Order::empty(OrderId::new(id)))
    {
        return errors::dispatch_error_to_response(e);
    }

    match services.order_get(&order_id) {
        Some(rm) => (StatusCode::CREATED, Json(dto::order_to_json(rm))).into_response(),
        None => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "projection_lag",
            "order not visible after create",
        ),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .orders_list()
        .into_iter()
        .map(dto::order_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.order_get(&order_id) {
        Some(rm) => (StatusCode::OK, Json(dto::order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStatusRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let status: OrderStatus = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return errors::dispatch_error_to_response(e.into()),
    };

    let assigned_to: Option<UserId> = match body.assigned_to {
        Some(raw) => match raw.parse() {
            Ok(u) => Some(u),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid assigned_to")
            }
        },
        None => None,
    };

    let cmd = UpdateStatus {
        order_id,
        status,
        notes: body.notes,
        tracking_number: body.tracking_number,
        estimated_delivery: body.estimated_delivery,
        assigned_to,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    };

    let sale = match services.fulfillment().update_status(cmd) {
        Ok((_, sale)) => sale,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    match services.order_get(&order_id) {
        Some(rm) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "order": dto::order_to_json(rm),
                "sale": sale.as_ref().map(dto::sale_to_json),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
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
    let cmd = CancelOrder {
        order_id,
        reason: body.reason,
        actor: actor.actor(),
        occurred_at: Utc::now(),
    };
    if let Err(e) = services.fulfillment().cancel(cmd) {
        return errors::dispatch_error_to_response(e);
    }
    match services.order_get(&order_id) {
        Some(rm) => (StatusCode::OK, Json(dto::order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}
