//! Request middleware: actor identity extraction.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use backroom_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Extract the acting identity from `x-actor-id` and stash it as an
/// [`ActorContext`] extension. Missing header is 401, malformed is 400.
pub async fn actor_middleware(mut req: Request, next: Next) -> Response {
    let Some(raw) = req.headers().get(ACTOR_HEADER) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "missing_actor",
            format!("{ACTOR_HEADER} header is required"),
        );
    };

    let actor: UserId = match raw.to_str().ok().and_then(|s| s.parse().ok()) {
        Some(id) => id,
        None => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_actor",
                format!("{ACTOR_HEADER} must be a UUID"),
            );
        }
    };

    req.extensions_mut().insert(ActorContext::new(actor));
    next.run(req).await
}
