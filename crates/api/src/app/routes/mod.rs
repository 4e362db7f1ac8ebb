use axum::Router;

pub mod inventory;
pub mod orders;
pub mod purchases;
pub mod sales;
pub mod system;

/// Router for all actor-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/purchases", purchases::router())
        .nest("/orders", orders::router())
        .nest("/inventory", inventory::router())
        .nest("/sales", sales::router())
}
