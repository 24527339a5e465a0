//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crewcal_core::CoreError;
use crewcal_store::StoreError;

use crate::import::ImportError;
use crate::stripe::StripeError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Invalid input or a disallowed state transition.
    #[error("{0}")]
    BadRequest(String),

    /// The payment provider rejected a call; the message is passed through.
    #[error("{0}")]
    Provider(String),

    /// The record changed underneath the request.
    #[error("{0}")]
    Conflict(String),

    /// A dependency required by the request is not configured.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Provider(msg) => (StatusCode::BAD_REQUEST, "provider_error", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::VersionConflict { id, .. } => {
                tracing::warn!(subscription_id = %id, "Concurrent subscription write rejected");
                Self::Conflict("Subscription was modified concurrently, please retry".into())
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<StripeError> for ApiError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::Api { message, .. } => Self::Provider(message),
            StripeError::InvalidSignature | StripeError::MalformedSignature(_) => {
                Self::BadRequest("Invalid webhook signature".into())
            }
            StripeError::Configuration(msg) => Self::ServiceUnavailable(msg),
            StripeError::Http(e) => Self::Internal(format!("payment provider unreachable: {e}")),
            StripeError::Serialization(e) => {
                Self::Internal(format!("unexpected payment provider response: {e}"))
            }
            StripeError::Malformed(msg) => Self::BadRequest(msg),
            StripeError::Unexpected(msg) => Self::Internal(msg),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownStatus(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::NotPendingCancellation
            | CoreError::UnknownPlan(_)
            | CoreError::UnknownFrequency(_)
            | CoreError::UnknownDateFormat(_)
            | CoreError::InvalidId(_) => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Store(e) => e.into(),
            other => Self::BadRequest(other.to_string()),
        }
    }
}
