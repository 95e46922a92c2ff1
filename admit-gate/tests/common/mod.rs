//! Shared helpers for admit-gate integration tests

#![allow(dead_code)]

use admit_common::api::{query_hash, sign_request};
use admit_common::db::init_database;
use admit_common::{time, QrCodec, TicketIdGenerator};
use admit_gate::{build_router, AppState, AuthSettings};
use axum::{
    body::Body,
    http::{Request, Response},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

pub const WEBHOOK_HASH: &str = "flw-test-hash";
pub const ADMIN_SECRET: &str = "gate-test-secret";
pub const QR_KEY: [u8; 32] = [42u8; 32];

/// Test app backed by a throwaway database; keep the TempDir alive
pub struct TestApp {
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("tickets.db")).await.unwrap();

        let auth = AuthSettings {
            webhook_secret_hash: Arc::from(WEBHOOK_HASH),
            admin_secret: Arc::from(ADMIN_SECRET),
            admin_window_ms: 30_000,
        };
        let state = AppState::new(pool, codec(), TicketIdGenerator::default(), auth);

        Self { state, _dir: dir }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }
}

pub fn codec() -> QrCodec {
    QrCodec::new(&QR_KEY).unwrap()
}

/// Provider notification for a successful payment
pub fn notification(tx_ref: &str, amount: Value, attendees: Option<Value>) -> Value {
    let mut meta = json!({});
    if let Some(attendees) = attendees {
        meta["attendees"] = attendees;
    }

    json!({
        "event": "charge.completed",
        "data": {
            "id": 285959875,
            "tx_ref": tx_ref,
            "flw_ref": "FLW-MOCK-1",
            "amount": amount,
            "currency": "NGN",
            "status": "successful",
            "customer": {
                "name": "Payer Person",
                "email": "payer@example.com",
                "phone_number": "08012345678"
            },
            "meta": meta
        }
    })
}

/// The TX-100 order: 3000 across three unpriced attendees
pub fn tx100() -> Value {
    notification(
        "TX-100",
        json!(3000),
        Some(json!(
            "[{\"full_name\":\"Ada Obi\",\"email\":\"ada@example.com\"},{\"full_name\":\"Bola Ade\"},{\"full_name\":\"Chidi Eze\"}]"
        )),
    )
}

pub fn webhook_request(body: &Value, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhook/flutterwave")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("verif-hash", sig);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// POST with `timestamp` and `hash` signed into the body
pub fn signed_post(uri: &str, mut body: Value) -> Request<Body> {
    sign_request(&mut body, ADMIN_SECRET, time::now_millis());
    json_post(uri, &body)
}

pub fn json_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// GET/DELETE with `timestamp` and `hash` query parameters
pub fn signed_request(method: &str, path: &str) -> Request<Body> {
    let timestamp = time::now_millis();
    let hash = query_hash(method, path, timestamp, ADMIN_SECRET);
    Request::builder()
        .method(method)
        .uri(format!("{}?timestamp={}&hash={}", path, timestamp, hash))
        .body(Body::empty())
        .unwrap()
}

pub fn plain_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub fn ticket_ids(body: &Value) -> Vec<String> {
    body["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["ticketId"].as_str().unwrap().to_string())
        .collect()
}
