//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use studio_core::StudioError;
use studio_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Insufficient tickets for the requested generation.
    #[error("insufficient tickets: available={available}, required={required}")]
    InsufficientTickets {
        /// Tickets currently available.
        available: i64,
        /// Tickets the generation would cost.
        required: i64,
    },

    /// Too many generations in flight for this user.
    #[error("too many generations in flight (limit {limit})")]
    TooManyInFlight {
        /// The configured cap.
        limit: usize,
    },

    /// The provider rejected the generation; tickets were refunded.
    #[error("generation rejected: {0}")]
    ProviderRejected(String),

    /// The provider was unreachable; tickets were refunded.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider did not finish in time; tickets were refunded.
    #[error("provider timed out")]
    ProviderTimeout,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::InsufficientTickets {
                available,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_tickets",
                self.to_string(),
                Some(serde_json::json!({
                    "available": available,
                    "required": required
                })),
            ),
            Self::TooManyInFlight { limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_in_flight",
                self.to_string(),
                Some(serde_json::json!({ "limit": limit })),
            ),
            Self::ProviderRejected(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "provider_rejected",
                msg.clone(),
                None,
            ),
            Self::ProviderUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "provider_unavailable",
                msg.clone(),
                None,
            ),
            Self::ProviderTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "provider_timeout",
                self.to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StudioError> for ApiError {
    fn from(err: StudioError) -> Self {
        match err {
            StudioError::InsufficientTickets {
                available,
                required,
            } => Self::InsufficientTickets {
                available,
                required,
            },
            StudioError::NoLedger { user_id } => {
                Self::NotFound(format!("no tickets provisioned for user {user_id}"))
            }
            StudioError::TooManyInFlight { limit } => Self::TooManyInFlight { limit },
            StudioError::JobNotFound { job_id } => Self::NotFound(format!("job not found: {job_id}")),
            StudioError::UnknownModel { model_id } => {
                Self::BadRequest(format!("unknown model: {model_id}"))
            }
            StudioError::InvalidParameters(msg) => Self::BadRequest(msg),
            StudioError::ProviderRejected(msg) => Self::ProviderRejected(msg),
            StudioError::ProviderUnavailable(msg) => Self::ProviderUnavailable(msg),
            StudioError::ProviderTimeout => Self::ProviderTimeout,
            StudioError::PersistenceFailure(msg) | StudioError::Storage(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::InsufficientTickets {
                available,
                required,
            } => Self::InsufficientTickets {
                available,
                required,
            },
            StoreError::InvalidAmount(amount) => {
                Self::BadRequest(format!("amount must be positive, got {amount}"))
            }
            StoreError::ReservationUnderflow { .. }
            | StoreError::Database(_)
            | StoreError::Serialization(_) => Self::Internal(err.to_string()),
        }
    }
}
