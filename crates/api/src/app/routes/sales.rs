use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:order_number", get(get_sale))
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_number): Path<String>,
) -> axum::response::Response {
    match services.sale(&order_number) {
        Some(sale) => (StatusCode::OK, Json(dto::sale_to_json(&sale))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sale not found"),
    }
}
