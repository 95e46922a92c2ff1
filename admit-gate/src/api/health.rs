//! Health check endpoints

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
///
/// Reports 503 when the database does not answer.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            module: "admit-gate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// GET /ping
pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Server is alive" }))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ping", get(ping))
}
