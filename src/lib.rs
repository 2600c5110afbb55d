use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod repository;

// Routers grouped by the gate stage that protects them.
pub mod routes;
use routes::{admin, authenticated, public, seller};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use payments::{MockPaymentService, PaymentState, StripePaymentClient};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler carrying a `#[utoipa::path]`, served at
/// `/api-docs/openapi.json` and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::issue_token, handlers::logout, handlers::list_medicines,
        handlers::list_categories, handlers::list_discounted, handlers::medicines_in_category,
        handlers::medicines_page, handlers::product_count, handlers::save_user,
        handlers::get_user, handlers::list_users, handlers::update_user_role,
        handlers::add_to_cart, handlers::get_cart, handlers::update_cart_quantity,
        handlers::remove_cart_item, handlers::create_payment_intent, handlers::create_booking,
        handlers::get_bookings, handlers::list_all_bookings, handlers::update_booking_status,
        handlers::create_medicine, handlers::seller_medicines, handlers::create_category,
        handlers::update_category, handlers::delete_category
    ),
    components(
        schemas(
            models::Role, models::Medicine, models::NewMedicine, models::Category,
            models::NewCategory, models::ProductCount, models::CartItem, models::NewCartItem,
            models::UpdateQuantityRequest, models::BookingItem, models::Booking, models::NewBooking,
            models::BookingStatusRequest, models::PaymentIntentRequest, models::PaymentIntentResponse,
            models::SignOnClaims, models::TokenResponse, models::LogoutResponse,
            models::UpdateRoleRequest,
        )
    ),
    tags(
        (name = "medzone", description = "MedZone medicine marketplace API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, built once in `main` and injected into every
/// handler. Cloning is cheap: the services are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Store access. Owns the connection pool for the lifetime of the process.
    pub repo: RepositoryState,
    /// Payment processor client.
    pub payments: PaymentState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let handlers and the gate pull just the piece of state they need.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for PaymentState {
    fn from_ref(app_state: &AppState) -> PaymentState {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the public, authenticated, seller and admin routers, attaches the
/// matching gate middleware to each, then wraps everything in the request-id,
/// tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth)),
        )
        .merge(
            seller::seller_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_seller)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Credentialed CORS restricted to the configured browser origins. Origins that
/// are not valid header values are skipped.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// trace_span_logger
///
/// Span for each request, tagged with the `x-request-id` set by the layer above
/// so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
