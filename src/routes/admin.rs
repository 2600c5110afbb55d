use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Admin Router Module
///
/// Wrapped in `auth::require_admin`: the caller's stored role must be exactly
/// `admin` before any of these handlers run.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Accounts ---
        .route("/users", get(handlers::list_users))
        // PATCH /users/{email}/role
        // The only way a role changes after creation.
        .route("/users/{email}/role", patch(handlers::update_user_role))
        // --- Category mutation ---
        .route("/category", post(handlers::create_category))
        .route(
            "/category/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        // --- Bookings oversight ---
        .route("/admin/bookings", get(handlers::list_all_bookings))
        .route("/admin/bookings/{id}/status", patch(handlers::update_booking_status))
}
