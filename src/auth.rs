use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{
    config::AppConfig,
    models::Role,
    repository::{Repository, RepositoryError, RepositoryState},
};

/// Claims
///
/// The payload signed into every access token. `email` is the identity claim;
/// anything else the caller supplied at sign-on rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    /// Issued At, seconds since the epoch.
    pub iat: i64,
    /// Expiration Time, seconds since the epoch.
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Why a claim set could not be turned into signable `Claims`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimSetError {
    #[error("claim set has no string email")]
    MissingEmail,

    /// `issued_at + ttl` falls outside the representable time range.
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
}

impl Claims {
    /// Packages a caller-supplied claim set.
    ///
    /// The registered time claims are always server-controlled: any `iat`/`exp`
    /// in the input is dropped. Everything else is carried through untouched.
    ///
    /// # Errors
    /// `MissingEmail` when the set has no non-empty string `email`, since such a
    /// token could never authenticate. `ExpiryOutOfRange` when the expiry cannot
    /// be represented.
    pub fn from_claim_set(
        mut claims: Map<String, Value>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, ClaimSetError> {
        let email = match claims.remove("email") {
            Some(Value::String(email)) if !email.is_empty() => email,
            _ => return Err(ClaimSetError::MissingEmail),
        };
        claims.remove("iat");
        claims.remove("exp");

        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(ClaimSetError::ExpiryOutOfRange)?;

        Ok(Self {
            email,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            extra: claims,
        })
    }
}

/// Identity
///
/// The authenticated caller for the lifetime of one request. Built only from a
/// verified token; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub email: String,
    /// Extra claims embedded at issuance.
    pub claims: Map<String, Value>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            email: claims.email,
            claims: claims.extra,
        }
    }
}

/// AuthError
///
/// Every way the gate can refuse a request. Each stage fails with exactly one of
/// these and later stages never run.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, tampered or expired credential.
    #[error("missing or invalid credential")]
    Unauthenticated,

    /// Valid identity, but no user record or the wrong role.
    #[error("insufficient role")]
    Forbidden,

    /// Valid identity acting on a resource owned by another identity.
    #[error("identity does not own the requested resource")]
    IdentityMismatch,

    /// The role lookup itself failed.
    #[error("role lookup failed: {0}")]
    Lookup(#[from] RepositoryError),

    #[error("credential could not be signed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden | AuthError::IdentityMismatch => StatusCode::FORBIDDEN,
            AuthError::Lookup(_) | AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Unauthenticated => "unauthorized access",
            AuthError::Forbidden | AuthError::IdentityMismatch => "forbidden access",
            AuthError::Lookup(_) | AuthError::Signing(_) => {
                tracing::error!(error = %self, "authorization gate failed internally");
                "internal server error"
            }
        };
        (self.status(), Json(json!({ "message": message }))).into_response()
    }
}

/// issue_credential
///
/// Signs `claims` with the server secret (HS256). No authentication happens here:
/// whoever reaches the sign-on endpoint gets a token for the claims they send.
pub fn issue_credential(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    Ok(encode(&Header::new(Algorithm::HS256), claims, &key)?)
}

/// authenticate
///
/// Extracts `Authorization: Bearer <token>` and verifies signature and expiry.
/// Purely computed: no session store is consulted.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Identity, AuthError> {
    // 1. Header extraction: only `Bearer <token>` with a non-empty token counts.
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::Unauthenticated)?;

    // 2. Validation rules: HS256 only, expiry enforced to the second.
    // `aud` is a caller-supplied extra claim here and is never checked.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.leeway = 0;

    // 3. Signature and claim verification. Every failure kind collapses to
    // Unauthenticated; the reason is only logged.
    let key = DecodingKey::from_secret(secret.as_bytes());
    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Ok(Identity::from(data.claims)),
        Err(e) => {
            tracing::debug!(reason = ?e.kind(), "rejected bearer token");
            Err(AuthError::Unauthenticated)
        }
    }
}

/// authorize_role
///
/// Admits the identity only if its stored role is exactly `required`.
/// Performs one read-only lookup; a store failure is surfaced, never retried.
pub async fn authorize_role(
    repo: &dyn Repository,
    identity: &Identity,
    required: Role,
) -> Result<(), AuthError> {
    // 1. Store lookup. An infrastructure failure aborts the gate as `Lookup`.
    let user = repo.find_user(&identity.email).await?;

    // 2. Exact role comparison. No record at all is treated like a wrong role.
    match user {
        Some(user) if user.role == required => Ok(()),
        Some(user) => {
            tracing::debug!(email = %identity.email, role = %user.role, %required, "role check failed");
            Err(AuthError::Forbidden)
        }
        None => {
            tracing::debug!(email = %identity.email, %required, "role check failed: no user record");
            Err(AuthError::Forbidden)
        }
    }
}

/// ensure_same_identity
///
/// Per-user resources may only be touched by the identity that owns them.
pub fn ensure_same_identity(identity: &Identity, owner_email: &str) -> Result<(), AuthError> {
    if identity.email == owner_email {
        Ok(())
    } else {
        Err(AuthError::IdentityMismatch)
    }
}

/// Identity Extractor
///
/// Reuses the identity a gate middleware already attached to the request, and
/// otherwise authenticates from the headers. Rejects with `AuthError`.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. A gate middleware earlier in the stack has already admitted the caller.
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        // 2. Otherwise authenticate from the `Authorization` header.
        let config = AppConfig::from_ref(state);
        authenticate(&parts.headers, &config.jwt_secret)
    }
}

// --- Gate middleware ---
//
// Stage order is fixed: the `Identity` extractor authenticates first, then the
// role check (if any) runs. The admitted identity is stored in the request
// extensions so handlers do not decode the token a second time.

/// require_auth
///
/// Authenticate only.
pub async fn require_auth(identity: Identity, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// require_seller
///
/// Authenticate, then AuthorizeRole(seller).
pub async fn require_seller(
    State(repo): State<RepositoryState>,
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    admit_role(repo, identity, Role::Seller, request, next).await
}

/// require_admin
///
/// Authenticate, then AuthorizeRole(admin).
pub async fn require_admin(
    State(repo): State<RepositoryState>,
    identity: Identity,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    admit_role(repo, identity, Role::Admin, request, next).await
}

async fn admit_role(
    repo: RepositoryState,
    identity: Identity,
    required: Role,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize_role(repo.as_ref(), &identity, required).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
