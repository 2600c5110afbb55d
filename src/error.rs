use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    auth::{AuthError, ClaimSetError},
    payments::PaymentError,
    repository::RepositoryError,
};

/// ApiError
///
/// The single error type returned by handlers. Client errors carry a fixed
/// message; server errors are logged and answered with a generic body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("claim set rejected: {0}")]
    ClaimSet(#[from] ClaimSetError),

    /// The request body could not be read as the expected JSON document.
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(&'static str),
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(e) => e.into_response(),
            ApiError::Repository(RepositoryError::Conflict(message)) => {
                json_error(StatusCode::CONFLICT, message)
            }
            ApiError::Repository(e) => {
                tracing::error!(error = %e, "repository call failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ApiError::Payment(e) => {
                tracing::error!(error = %e, "payment intent creation failed");
                json_error(StatusCode::BAD_GATEWAY, "payment processor unavailable")
            }
            ApiError::ClaimSet(ClaimSetError::MissingEmail) => {
                json_error(StatusCode::BAD_REQUEST, "email claim is required")
            }
            ApiError::ClaimSet(e) => {
                tracing::error!(error = %e, "access token could not be built");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            ApiError::Body(rejection) => json_error(rejection.status(), rejection.body_text()),
            ApiError::NotFound(what) => json_error(StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::BadRequest(message) => json_error(StatusCode::BAD_REQUEST, message),
        }
    }
}

/// JsonBody
///
/// `Json<T>` with its rejection routed through `ApiError`, so a malformed body
/// is answered with the same `{"message"}` shape as every other error.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
