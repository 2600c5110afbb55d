use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Seller Router Module
///
/// Wrapped in `auth::require_seller`. The role match is exact, so admins are
/// refused here as well.
pub fn seller_routes() -> Router<AppState> {
    Router::new().route(
        "/seller/medicines",
        get(handlers::seller_medicines).post(handlers::create_medicine),
    )
}
