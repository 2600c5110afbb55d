use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind `auth::require_auth`. Handlers for per-user
/// data (cart, bookings) also compare the path/body owner with the
/// authenticated identity and answer 403 on mismatch.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /user/{email}
        .route("/user/{email}", get(handlers::get_user))
        // --- Cart ---
        .route("/cartInformation", post(handlers::add_to_cart))
        // One pattern serves both shapes: `key` is the owner email for GET and the
        // cart line id for PATCH/DELETE.
        .route(
            "/cartInformation/{key}",
            get(handlers::get_cart)
                .patch(handlers::update_cart_quantity)
                .delete(handlers::remove_cart_item),
        )
        // --- Checkout ---
        .route("/create-payment-intent", post(handlers::create_payment_intent))
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/{email}", get(handlers::get_bookings))
}
