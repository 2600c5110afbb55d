use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles & Accounts ---

/// Role
///
/// The RBAC field stored on every user record. Checks against it are exact:
/// an `admin` does not implicitly pass a `seller` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The status value a returning user sends when asking for a role change.
pub const STATUS_REQUESTED: &str = "Requested";

/// UserRecord
///
/// The canonical account document, keyed by `email`. Profile fields supplied by the
/// client at sign-in (name, photo, ...) are kept verbatim and flattened back into
/// the JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Creation time in milliseconds since the epoch. Written once.
    pub timestamp: i64,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// SaveUserRequest
///
/// Input payload for `PUT /user`. Everything besides `email`, `role` and `status`
/// is treated as a profile field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl SaveUserRequest {
    /// Builds the record persisted on first sign-in. The role defaults to `user`
    /// and any client-supplied `timestamp` is discarded in favour of `now_ms`.
    pub fn into_record(self, now_ms: i64) -> UserRecord {
        let mut profile = self.profile;
        profile.remove("timestamp");

        UserRecord {
            email: self.email,
            role: self.role.unwrap_or_default(),
            status: self.status,
            timestamp: now_ms,
            profile,
        }
    }

    pub fn is_role_request(&self) -> bool {
        self.status.as_deref() == Some(STATUS_REQUESTED)
    }
}

/// SaveUserOutcome
///
/// Which of the three upsert branches `PUT /user` took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveUserOutcome {
    /// First sign-in: a new record was written.
    Created { user: UserRecord },
    /// Returning user asked for a role change; only `status` was touched.
    StatusUpdated { user: UserRecord },
    /// Returning user signed in again; nothing changed.
    Existing { user: UserRecord },
}

/// UpdateRoleRequest
///
/// Admin payload for `PATCH /users/{email}/role`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

// --- Catalogue ---

/// Medicine
///
/// A product listed in the marketplace.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: String,
    pub company: Option<String>,
    pub unit: Option<String>,
    pub price: f64,
    pub discount_percentage: f64,
    /// Drives the `/discounted` listing.
    pub discount_status: bool,
    /// Owner, when the medicine was listed by a seller.
    pub seller_email: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewMedicine
///
/// Input payload for a seller listing a medicine. The owner is taken from the
/// authenticated identity, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewMedicine {
    pub name: String,
    pub generic_name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: String,
    pub company: Option<String>,
    pub unit: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub discount_status: bool,
}

/// Category
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewCategory
///
/// Admin payload used for both creating and replacing a category.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewCategory {
    pub name: String,
    pub image: Option<String>,
}

/// ProductCount
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProductCount {
    pub count: i64,
}

// --- Cart ---

/// CartItem
///
/// One line in a user's cart. `email` is the owning identity.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CartItem {
    pub id: Uuid,
    pub email: String,
    pub medicine_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: f64,
    pub quantity: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewCartItem
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewCartItem {
    pub email: String,
    pub medicine_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// UpdateQuantityRequest
///
/// Partial update for a cart line. The value is kept untyped so that a
/// non-integer quantity is reported as a validation failure (400) rather than
/// a body rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateQuantityRequest {
    #[schema(value_type = i32)]
    #[ts(type = "number")]
    pub quantity: Value,
}

impl UpdateQuantityRequest {
    /// Returns the quantity when it is a positive integer that fits a cart line.
    pub fn positive_quantity(&self) -> Option<i32> {
        self.quantity
            .as_i64()
            .filter(|q| *q > 0)
            .and_then(|q| i32::try_from(q).ok())
    }
}

// --- Bookings & Payments ---

/// BookingItem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BookingItem {
    pub medicine_id: Uuid,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
}

/// Booking
///
/// A completed checkout. Items are stored as a JSONB snapshot so later catalogue
/// edits do not rewrite order history.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Booking {
    pub id: Uuid,
    pub email: String,
    #[sqlx(json)]
    pub items: Vec<BookingItem>,
    pub total_price: f64,
    pub transaction_id: String,
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewBooking
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewBooking {
    pub email: String,
    pub items: Vec<BookingItem>,
    pub total_price: f64,
    pub transaction_id: String,
    #[serde(default = "default_booking_status")]
    pub status: String,
}

fn default_booking_status() -> String {
    "pending".to_string()
}

/// BookingStatusRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BookingStatusRequest {
    pub status: String,
}

/// PaymentIntentRequest
///
/// `price` is in major currency units; the handler converts it to cents.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaymentIntentRequest {
    pub price: f64,
}

/// PaymentIntentResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

// --- Session ---

/// SignOnClaims
///
/// The minimal body accepted by `POST /jwt` and `PUT /user`. Both endpoints keep
/// any additional fields the client sends, so this type only documents the
/// required part.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignOnClaims {
    #[schema(example = "buyer@example.com")]
    pub email: String,
}

/// TokenResponse
///
/// Output of `POST /jwt`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// LogoutResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LogoutResponse {
    pub success: bool,
}
