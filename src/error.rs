use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

/// The primary error type for the application.
///
/// Every pipeline stage that can short-circuit a request maps its rejection
/// onto one of these variants; the `IntoResponse` impl owns the wire format.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a client has sent too many requests inside the current window.
    RateLimited {
        /// The number of seconds to wait before retrying the request.
        retry_after_seconds: u64,
    },
    /// For state-changing requests whose CSRF header and cookie tokens are
    /// missing or do not match. Fatal for the current request; the client
    /// obtains a fresh token by revisiting any GET endpoint.
    CsrfRejected,
    /// For request payloads the sanitizer could not process. The pipeline
    /// fails closed: the request is rejected rather than forwarded unsanitized.
    SanitizationFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::RateLimited { retry_after_seconds } => {
                write!(f, "Rate limited. Retry after {} seconds", retry_after_seconds)
            }
            AppError::CsrfRejected => write!(f, "CSRF token invalid"),
            AppError::SanitizationFailed(msg) => write!(f, "Sanitization failed: {}", msg),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Error ID: {}", error_id);
                let body = json!({
                    "error": {
                        "code": "INTERNAL_ERROR",
                        "message": "An internal server error occurred",
                        "details": { "error_id": error_id.to_string() },
                    },
                    "status": 500,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            AppError::BadRequest(msg) => {
                let body = json!({
                    "error": {
                        "code": "BAD_REQUEST",
                        "message": msg,
                    },
                    "status": 400,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            // Wire contract: 429 with { error, retryAfter }
            AppError::RateLimited { retry_after_seconds } => {
                let body = json!({
                    "error": format!(
                        "Too many requests. Please retry after {} seconds",
                        retry_after_seconds
                    ),
                    "retryAfter": retry_after_seconds,
                });
                (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
            }
            // Wire contract: 403 plain text
            AppError::CsrfRejected => {
                (StatusCode::FORBIDDEN, "CSRF token invalid").into_response()
            }
            AppError::SanitizationFailed(msg) => {
                tracing::warn!("Rejecting unsanitizable payload: {}", msg);
                let body = json!({
                    "error": {
                        "code": "SANITIZATION_FAILED",
                        "message": "Request payload could not be sanitized",
                    },
                    "status": 400,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
