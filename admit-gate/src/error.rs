//! HTTP error mapping for admit-gate

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// admit-common error
    #[error(transparent)]
    Common(#[from] admit_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use admit_common::Error as E;

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Common(err) => match err {
                E::InvalidToken => (StatusCode::BAD_REQUEST, "INVALID_TOKEN", "Invalid QR code".to_string()),
                E::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", format!("{} not found", msg)),
                E::Validation(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
                other => {
                    error!("Request failed: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", other.to_string())
                }
            },
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

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
