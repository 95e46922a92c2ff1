//! Signed-request authentication middleware
//!
//! Every protected request carries `timestamp` (Unix epoch ms) and `hash`.
//! GET and DELETE carry them as query parameters, hashed together with the
//! method and path; other methods carry them in the JSON body, where the hash
//! covers the whole body.

use admit_common::api::auth::{
    validate_hash, validate_query_hash, validate_timestamp, ApiAuthError,
};
use admit_common::api::AuthQuery;
use admit_common::time;
use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

/// Largest request body accepted for hashing
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Authentication fields of a JSON body
#[derive(Debug, Deserialize)]
struct AuthFields {
    timestamp: i64,
    hash: String,
}

/// Authentication middleware
///
/// Returns 401 Unauthorized if validation fails.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let secret = state.auth.admin_secret.clone();
    let window_ms = state.auth.admin_window_ms;

    if matches!(*request.method(), Method::GET | Method::DELETE | Method::HEAD) {
        let Query(auth) = Query::<AuthQuery>::try_from_uri(request.uri())
            .map_err(|e| AuthError::MissingFields(e.body_text()))?;

        check_timestamp(auth.timestamp, window_ms)?;

        let method = request.method().as_str();
        let path = request.uri().path();
        validate_query_hash(&auth.hash, method, path, auth.timestamp, &secret).map_err(|_| {
            warn!(path = %request.uri().path(), "Query hash validation failed");
            AuthError::InvalidHash
        })?;

        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AuthError::ParseError(format!("Failed to read body: {}", e)))?;

    let json_value: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| AuthError::ParseError(format!("Invalid JSON: {}", e)))?;

    let auth_fields: AuthFields = serde_json::from_value(json_value.clone())
        .map_err(|e| AuthError::MissingFields(e.to_string()))?;

    check_timestamp(auth_fields.timestamp, window_ms)?;

    validate_hash(&auth_fields.hash, &json_value, &secret).map_err(|_| {
        warn!(path = %parts.uri.path(), "Body hash validation failed");
        AuthError::InvalidHash
    })?;

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}

fn check_timestamp(timestamp: i64, window_ms: i64) -> Result<(), AuthError> {
    validate_timestamp(timestamp, time::now_millis(), window_ms).map_err(|e| match e {
        ApiAuthError::InvalidTimestamp { reason, .. } => AuthError::InvalidTimestamp(reason),
        other => AuthError::MissingFields(other.to_string()),
    })
}

/// Authentication error types for HTTP responses
#[derive(Debug)]
pub enum AuthError {
    InvalidTimestamp(String),
    InvalidHash,
    MissingFields(String),
    ParseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::InvalidTimestamp(reason) => format!("Invalid timestamp: {}", reason),
            AuthError::InvalidHash => "Invalid hash".to_string(),
            AuthError::MissingFields(msg) => format!("Missing credentials: {}", msg),
            AuthError::ParseError(msg) => format!("Parse error: {}", msg),
        };

        let body = Json(json!({
            "error": message,
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
