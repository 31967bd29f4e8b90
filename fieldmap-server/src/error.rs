//! Error types for fieldmap-server
//!
//! Row-level problems during reconciliation never surface here; they are
//! reported as per-row outcomes. Only batch-level failures become an
//! `ApiError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::RoutingError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Third-party provider answered with a non-success status; relayed as-is
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// fieldmap-common error
    #[error("{0}")]
    Common(#[from] fieldmap_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => common_error_parts(err),
            ApiError::Upstream { status, message } => return upstream_response(status, message),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Provider failures keep the provider's status and the flat error shape
/// the map front end already understands
fn upstream_response(status: u16, message: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = Json(json!({
        "error": "TomTom API error",
        "status_code": status.as_u16(),
        "message": message,
    }));
    (status, body).into_response()
}

fn common_error_parts(err: fieldmap_common::Error) -> (StatusCode, &'static str, String) {
    use fieldmap_common::Error;

    match err {
        Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
        Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
        Error::Io(ref e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", other.to_string()),
    }
}

impl From<RoutingError> for ApiError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::ApiError(status, body) => ApiError::Upstream {
                status,
                message: body,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
