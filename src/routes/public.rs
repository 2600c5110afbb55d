use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Public Router Module
///
/// Endpoints reachable without a credential. `PUT /user` is deliberately public:
/// it runs right after the external sign-in, before the client holds a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "Hello from medzone server" }))
        // GET /health
        // Also pings the store, so a dead pool shows up as 503.
        .route("/health", get(handlers::health))
        // --- Session ---
        .route("/jwt", post(handlers::issue_token))
        .route("/logout", get(handlers::logout))
        // --- Catalogue ---
        .route("/medicine", get(handlers::list_medicines))
        .route("/category", get(handlers::list_categories))
        .route("/discounted", get(handlers::list_discounted))
        .route("/UniqueCategory/{category}", get(handlers::medicines_in_category))
        // GET /allMedicines?page=..&size=..
        .route("/allMedicines", get(handlers::medicines_page))
        .route("/productCount", get(handlers::product_count))
        // --- Accounts ---
        .route("/user", put(handlers::save_user))
}
