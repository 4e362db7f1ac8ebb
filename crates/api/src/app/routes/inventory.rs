use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use backroom_catalog::ProductId;
use backroom_core::AggregateId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/movements", get(list_movements))
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub product_id: Option<String>,
    pub reference: Option<String>,
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<MovementsQuery>,
) -> axum::response::Response {
    let product_id = match query.product_id {
        Some(raw) => match raw.parse::<AggregateId>() {
            Ok(agg) => Some(ProductId::new(agg)),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product_id")
            }
        },
        None => None,
    };

    let items = services
        .movements(product_id, query.reference.as_deref())
        .iter()
        .map(dto::movement_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
