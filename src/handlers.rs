use crate::{
    AppState,
    auth::{self, ClaimSetError, Claims, Identity},
    config::{AppConfig, Env},
    error::{ApiError, ApiResult, JsonBody},
    models::{
        Booking, BookingStatusRequest, CartItem, Category, LogoutResponse, Medicine, NewBooking,
        NewCartItem, NewCategory, NewMedicine, PaymentIntentRequest, PaymentIntentResponse,
        ProductCount, STATUS_REQUESTED, SaveUserOutcome, SaveUserRequest, SignOnClaims, TokenResponse,
        UpdateQuantityRequest, UpdateRoleRequest, UserRecord,
    },
    repository::RepositoryState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const PAYMENT_CURRENCY: &str = "usd";

/// Pagination
///
/// Query parameters for `GET /allMedicines`.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct Pagination {
    /// Zero-based page index. Defaults to 0.
    pub page: Option<i64>,
    /// Items per page, clamped to 1..=100. Defaults to 10.
    pub size: Option<i64>,
}

impl Pagination {
    /// Resolves to `(offset, limit)`.
    pub fn window(&self) -> (i64, i64) {
        let size = self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(0).max(0);
        (page.saturating_mul(size), size)
    }
}

// --- Session ---

/// issue_token
///
/// [Public Route] Sign-on. Packages the posted claim set into a signed token.
/// The caller's right to the claimed email is not checked here; an upstream
/// identity provider is trusted to have done so.
///
/// Every claim other than `iat`/`exp` (which the server sets) is carried into
/// the token and comes back as `Identity::claims` on later requests. The
/// lifetime is `TOKEN_TTL_DAYS`.
#[utoipa::path(
    post,
    path = "/jwt",
    request_body = SignOnClaims,
    responses(
        (status = 200, description = "Signed token", body = TokenResponse),
        (status = 400, description = "Claim set without an email")
    )
)]
pub async fn issue_token(
    State(config): State<AppConfig>,
    JsonBody(claims): JsonBody<Map<String, Value>>,
) -> ApiResult<Json<TokenResponse>> {
    let ttl = Duration::try_days(config.token_ttl_days).ok_or(ClaimSetError::ExpiryOutOfRange)?;
    let claims = Claims::from_claim_set(claims, Utc::now(), ttl)?;
    let token = auth::issue_credential(&claims, &config.jwt_secret)?;
    tracing::debug!(email = %claims.email, "issued access token");
    Ok(Json(TokenResponse { token }))
}

/// logout
///
/// [Public Route] Sign-off. Tells the browser to drop its `token` cookie. The
/// token itself stays valid until it expires.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 200, description = "Cookie cleared", body = LogoutResponse))
)]
pub async fn logout(State(config): State<AppConfig>) -> impl IntoResponse {
    let cookie = match config.env {
        Env::Production => "token=; Max-Age=0; Path=/; HttpOnly; Secure; SameSite=None",
        Env::Local => "token=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict",
    };
    tracing::info!("logout successful");
    (
        [(header::SET_COOKIE, cookie)],
        Json(LogoutResponse { success: true }),
    )
}

/// health
///
/// [Public Route] Liveness plus a store round-trip. Answers `503` when the pool
/// cannot reach Postgres.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and store reachable", body = String),
        (status = 503, description = "Store unreachable", body = String)
    )
)]
pub async fn health(State(repo): State<RepositoryState>) -> (StatusCode, &'static str) {
    match repo.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

// --- Catalogue (public) ---

/// list_medicines
///
/// [Public Route] The whole catalogue, newest first. Used by the shop page.
#[utoipa::path(
    get,
    path = "/medicine",
    responses((status = 200, description = "All medicines", body = [Medicine]))
)]
pub async fn list_medicines(State(state): State<AppState>) -> ApiResult<Json<Vec<Medicine>>> {
    Ok(Json(state.repo.list_medicines().await?))
}

/// list_categories
///
/// [Public Route] Every category, ordered by name.
#[utoipa::path(
    get,
    path = "/category",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories().await?))
}

/// list_discounted
///
/// [Public Route] Medicines currently flagged with `discount_status`.
#[utoipa::path(
    get,
    path = "/discounted",
    responses((status = 200, description = "Discounted medicines", body = [Medicine]))
)]
pub async fn list_discounted(State(state): State<AppState>) -> ApiResult<Json<Vec<Medicine>>> {
    Ok(Json(state.repo.list_discounted().await?))
}

/// medicines_in_category
///
/// [Public Route] Returns 404 rather than an empty list when nothing matches.
#[utoipa::path(
    get,
    path = "/UniqueCategory/{category}",
    params(("category" = String, Path, description = "Category name")),
    responses(
        (status = 200, description = "Medicines in category", body = [Medicine]),
        (status = 404, description = "No medicines in category")
    )
)]
pub async fn medicines_in_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Json<Vec<Medicine>>> {
    let medicines = state.repo.medicines_by_category(&category).await?;
    if medicines.is_empty() {
        return Err(ApiError::NotFound("medicines"));
    }
    Ok(Json(medicines))
}

/// medicines_page
///
/// [Public Route] One page of the catalogue. The ordering is stable across
/// requests so pages never overlap; see `Pagination` for defaults and clamping.
#[utoipa::path(
    get,
    path = "/allMedicines",
    params(Pagination),
    responses((status = 200, description = "One page of medicines", body = [Medicine]))
)]
pub async fn medicines_page(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<Medicine>>> {
    let (offset, limit) = pagination.window();
    Ok(Json(state.repo.medicines_page(offset, limit).await?))
}

/// product_count
///
/// [Public Route] Total number of medicines, for client-side pagination.
#[utoipa::path(
    get,
    path = "/productCount",
    responses((status = 200, description = "Number of medicines", body = ProductCount))
)]
pub async fn product_count(State(state): State<AppState>) -> ApiResult<Json<ProductCount>> {
    let count = state.repo.count_medicines().await?;
    Ok(Json(ProductCount { count }))
}

// --- Users ---

/// save_user
///
/// [Public Route] Called by the client after every sign-in.
///
/// - unknown email: the record is created with the supplied role (default
///   `user`) and a creation timestamp;
/// - known email with `status = "Requested"`: only `status` is updated;
/// - known email otherwise: the stored record is returned untouched.
#[utoipa::path(
    put,
    path = "/user",
    request_body = SignOnClaims,
    responses(
        (status = 200, description = "Upsert outcome"),
        (status = 400, description = "Missing email")
    )
)]
pub async fn save_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SaveUserRequest>,
) -> ApiResult<Json<SaveUserOutcome>> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::BadRequest("email is required"));
    }

    if let Some(existing) = state.repo.find_user(&payload.email).await? {
        if !payload.is_role_request() {
            return Ok(Json(SaveUserOutcome::Existing { user: existing }));
        }
        let user = state
            .repo
            .set_user_status(&existing.email, STATUS_REQUESTED)
            .await?
            .ok_or(ApiError::NotFound("user"))?;
        tracing::info!(email = %user.email, "role change requested");
        return Ok(Json(SaveUserOutcome::StatusUpdated { user }));
    }

    let email = payload.email.clone();
    let record = payload.into_record(Utc::now().timestamp_millis());

    match state.repo.insert_user(record).await? {
        Some(user) => {
            tracing::info!(email = %user.email, role = %user.role, "user record created");
            Ok(Json(SaveUserOutcome::Created { user }))
        }
        // A concurrent first sign-in won the insert.
        None => {
            let user = state
                .repo
                .find_user(&email)
                .await?
                .ok_or(ApiError::NotFound("user"))?;
            Ok(Json(SaveUserOutcome::Existing { user }))
        }
    }
}

/// get_user
///
/// [Authenticated Route] Fetches a stored user record (used by clients to read roles).
#[utoipa::path(
    get,
    path = "/user/{email}",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "User record"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "No such user")
    )
)]
pub async fn get_user(
    _identity: Identity,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<UserRecord>> {
    state
        .repo
        .find_user(&email)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("user"))
}

/// list_users
///
/// [Admin Route] Every user record.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All user records"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserRecord>>> {
    Ok(Json(state.repo.list_users().await?))
}

/// update_user_role
///
/// [Admin Route] The only place a role changes. Resolves any pending request.
#[utoipa::path(
    patch,
    path = "/users/{email}/role",
    params(("email" = String, Path, description = "User email")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated user record"),
        (status = 404, description = "No such user")
    )
)]
pub async fn update_user_role(
    identity: Identity,
    State(state): State<AppState>,
    Path(email): Path<String>,
    JsonBody(payload): JsonBody<UpdateRoleRequest>,
) -> ApiResult<Json<UserRecord>> {
    let user = state
        .repo
        .set_user_role(&email, payload.role)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    tracing::info!(admin = %identity.email, email = %user.email, role = %user.role, "role updated");
    Ok(Json(user))
}

// --- Cart ---

/// add_to_cart
///
/// [Authenticated Route] Adds a line to the caller's own cart.
#[utoipa::path(
    post,
    path = "/cartInformation",
    request_body = NewCartItem,
    responses(
        (status = 200, description = "Stored cart line", body = CartItem),
        (status = 400, description = "Non-positive quantity"),
        (status = 403, description = "Cart belongs to another identity")
    )
)]
pub async fn add_to_cart(
    identity: Identity,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewCartItem>,
) -> ApiResult<Json<CartItem>> {
    auth::ensure_same_identity(&identity, &payload.email)?;
    if payload.quantity <= 0 {
        return Err(ApiError::BadRequest("quantity must be a positive number"));
    }
    Ok(Json(state.repo.add_cart_item(payload).await?))
}

/// get_cart
///
/// [Authenticated Route] The cart of `{email}`, readable only by that identity.
#[utoipa::path(
    get,
    path = "/cartInformation/{email}",
    params(("email" = String, Path, description = "Cart owner")),
    responses(
        (status = 200, description = "Cart lines", body = [CartItem]),
        (status = 403, description = "Cart belongs to another identity")
    )
)]
pub async fn get_cart(
    identity: Identity,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<Vec<CartItem>>> {
    auth::ensure_same_identity(&identity, &email)?;
    Ok(Json(state.repo.cart_for(&email).await?))
}

/// update_cart_quantity
///
/// [Authenticated Route] Only lines owned by the caller can be updated; anything
/// else is reported as not found.
#[utoipa::path(
    patch,
    path = "/cartInformation/{id}",
    params(("id" = Uuid, Path, description = "Cart line ID")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Updated cart line", body = CartItem),
        (status = 400, description = "Quantity is not a positive integer"),
        (status = 404, description = "Not found or not yours")
    )
)]
pub async fn update_cart_quantity(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateQuantityRequest>,
) -> ApiResult<Json<CartItem>> {
    let quantity = payload
        .positive_quantity()
        .ok_or(ApiError::BadRequest("quantity must be a positive number"))?;

    state
        .repo
        .update_cart_quantity(id, &identity.email, quantity)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("cart item"))
}

/// remove_cart_item
///
/// [Authenticated Route] Deletes one of the caller's cart lines. The delete is
/// scoped to the caller's email, so a foreign id is indistinguishable from a
/// missing one and answers `404`.
#[utoipa::path(
    delete,
    path = "/cartInformation/{id}",
    params(("id" = Uuid, Path, description = "Cart line ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Not found or not yours")
    )
)]
pub async fn remove_cart_item(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.repo.remove_cart_item(id, &identity.email).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("cart item"))
    }
}

// --- Payments & Bookings ---

/// create_payment_intent
///
/// [Authenticated Route] Converts `price` to cents and asks the processor for a
/// client secret.
#[utoipa::path(
    post,
    path = "/create-payment-intent",
    request_body = PaymentIntentRequest,
    responses(
        (status = 200, description = "Client secret", body = PaymentIntentResponse),
        (status = 400, description = "Non-positive price"),
        (status = 502, description = "Processor failure")
    )
)]
pub async fn create_payment_intent(
    identity: Identity,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PaymentIntentRequest>,
) -> ApiResult<Json<PaymentIntentResponse>> {
    let amount = to_minor_units(payload.price)
        .ok_or(ApiError::BadRequest("price must be a positive amount"))?;

    let client_secret = state
        .payments
        .create_payment_intent(amount, PAYMENT_CURRENCY)
        .await?;
    tracing::info!(email = %identity.email, amount, "payment intent created");
    Ok(Json(PaymentIntentResponse { client_secret }))
}

/// Price in major units to a positive number of cents.
fn to_minor_units(price: f64) -> Option<i64> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let cents = (price * 100.0).round();
    if cents < 1.0 || cents > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

/// create_booking
///
/// [Authenticated Route] Records a checkout for the caller and empties their cart.
#[utoipa::path(
    post,
    path = "/bookings",
    request_body = NewBooking,
    responses(
        (status = 200, description = "Stored booking", body = Booking),
        (status = 400, description = "Empty booking"),
        (status = 403, description = "Booking for another identity")
    )
)]
pub async fn create_booking(
    identity: Identity,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewBooking>,
) -> ApiResult<Json<Booking>> {
    auth::ensure_same_identity(&identity, &payload.email)?;
    if payload.items.is_empty() {
        return Err(ApiError::BadRequest("booking must contain at least one item"));
    }
    if !payload.total_price.is_finite() || payload.total_price < 0.0 {
        return Err(ApiError::BadRequest("total price must not be negative"));
    }

    let booking = state.repo.create_booking(payload).await?;
    tracing::info!(email = %booking.email, booking = %booking.id, "booking recorded, cart cleared");
    Ok(Json(booking))
}

/// get_bookings
///
/// [Authenticated Route] Order history of `{email}`, newest first. Readable
/// only by that identity.
#[utoipa::path(
    get,
    path = "/bookings/{email}",
    params(("email" = String, Path, description = "Booking owner")),
    responses(
        (status = 200, description = "Bookings", body = [Booking]),
        (status = 403, description = "Bookings belong to another identity")
    )
)]
pub async fn get_bookings(
    identity: Identity,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<Vec<Booking>>> {
    auth::ensure_same_identity(&identity, &email)?;
    Ok(Json(state.repo.bookings_for(&email).await?))
}

/// list_all_bookings
///
/// [Admin Route] Every booking in the system, newest first.
#[utoipa::path(
    get,
    path = "/admin/bookings",
    responses((status = 200, description = "All bookings", body = [Booking]))
)]
pub async fn list_all_bookings(State(state): State<AppState>) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(state.repo.list_bookings().await?))
}

/// update_booking_status
///
/// [Admin Route] Moves a booking to a new status (e.g. `pending` to `paid`).
/// The value is free text but must not be blank.
#[utoipa::path(
    patch,
    path = "/admin/bookings/{id}/status",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = BookingStatusRequest,
    responses(
        (status = 200, description = "Updated booking", body = Booking),
        (status = 404, description = "No such booking")
    )
)]
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<BookingStatusRequest>,
) -> ApiResult<Json<Booking>> {
    if payload.status.trim().is_empty() {
        return Err(ApiError::BadRequest("status is required"));
    }
    state
        .repo
        .set_booking_status(id, &payload.status)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("booking"))
}

// --- Seller ---

/// create_medicine
///
/// [Seller Route] Lists a new medicine owned by the calling seller.
#[utoipa::path(
    post,
    path = "/seller/medicines",
    request_body = NewMedicine,
    responses(
        (status = 200, description = "Listed medicine", body = Medicine),
        (status = 403, description = "Caller is not a seller")
    )
)]
pub async fn create_medicine(
    identity: Identity,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewMedicine>,
) -> ApiResult<Json<Medicine>> {
    if payload.name.trim().is_empty() || payload.category.trim().is_empty() {
        return Err(ApiError::BadRequest("name and category are required"));
    }
    if !payload.price.is_finite() || payload.price < 0.0 {
        return Err(ApiError::BadRequest("price must not be negative"));
    }
    Ok(Json(state.repo.create_medicine(payload, &identity.email).await?))
}

/// seller_medicines
///
/// [Seller Route] The medicines listed by the calling seller.
#[utoipa::path(
    get,
    path = "/seller/medicines",
    responses((status = 200, description = "The seller's medicines", body = [Medicine]))
)]
pub async fn seller_medicines(
    identity: Identity,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Medicine>>> {
    Ok(Json(state.repo.medicines_by_seller(&identity.email).await?))
}

// --- Categories (admin) ---

/// create_category
///
/// [Admin Route] Adds a category. Names are unique; a duplicate answers `409`.
#[utoipa::path(
    post,
    path = "/category",
    request_body = NewCategory,
    responses(
        (status = 200, description = "Created category", body = Category),
        (status = 409, description = "Category name already exists")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewCategory>,
) -> ApiResult<Json<Category>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required"));
    }
    Ok(Json(state.repo.create_category(payload).await?))
}

/// update_category
///
/// [Admin Route] Replaces name and image of a category. Renaming onto an
/// existing name answers `409`.
#[utoipa::path(
    put,
    path = "/category/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = NewCategory,
    responses(
        (status = 200, description = "Updated category", body = Category),
        (status = 404, description = "No such category"),
        (status = 409, description = "Category name already exists")
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<NewCategory>,
) -> ApiResult<Json<Category>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required"));
    }
    state
        .repo
        .update_category(id, payload)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("category"))
}

/// delete_category
///
/// [Admin Route] Removes a category. Medicines keep their category text.
#[utoipa::path(
    delete,
    path = "/category/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such category")
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.repo.delete_category(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("category"))
    }
}
