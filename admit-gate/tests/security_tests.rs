//! Security tests for admit-gate
//!
//! Signed-request authentication on privileged routes and webhook signature
//! handling.

mod common;

use admit_common::api::{query_hash, sign_request};
use admit_common::time;
use axum::{body::Body, http::Request, http::StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_scan_without_credentials_rejected() {
    let app = TestApp::new().await;

    let response = app
        .send(json_post("/api/scan", &json!({"qrData": "anything"})))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_listing_without_credentials_rejected() {
    let app = TestApp::new().await;

    let response = app.send(plain_request("GET", "/api/tickets")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(plain_request("DELETE", "/api/tickets/NACOS-00000000")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let app = TestApp::new().await;

    let mut body = json!({"qrData": "anything"});
    sign_request(&mut body, "not-the-secret", time::now_millis());

    let response = app.send(json_post("/api/scan", &body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Invalid hash");
}

#[tokio::test]
async fn test_body_modified_after_signing_rejected() {
    let app = TestApp::new().await;

    let mut body = json!({"qrData": "original"});
    sign_request(&mut body, ADMIN_SECRET, time::now_millis());
    body["qrData"] = json!("swapped");

    let response = app.send(json_post("/api/scan", &body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stale_and_future_timestamps_rejected() {
    let app = TestApp::new().await;

    for offset in [-60_000i64, 60_000] {
        let mut body = json!({"qrData": "anything"});
        sign_request(&mut body, ADMIN_SECRET, time::now_millis() + offset);

        let response = app.send(json_post("/api/scan", &body)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = extract_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid timestamp"));
    }
}

#[tokio::test]
async fn test_query_hash_bound_to_timestamp() {
    let app = TestApp::new().await;

    let timestamp = time::now_millis();
    let hash = query_hash("GET", "/api/tickets", timestamp, ADMIN_SECRET);
    let uri = format!("/api/tickets?timestamp={}&hash={}", timestamp - 1, hash);

    let response = app.send(plain_request("GET", &uri)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signed_request_accepted() {
    let app = TestApp::new().await;

    let response = app.send(signed_request("GET", "/api/tickets")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!([]));
}

#[tokio::test]
async fn test_body_size_limit_10mb() {
    let app = TestApp::new().await;

    let large_body = vec![b'x'; 11 * 1024 * 1024];
    let request = Request::builder()
        .method("POST")
        .uri("/api/scan")
        .header("content-type", "application/json")
        .body(Body::from(large_body))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_signature_is_exact() {
    let app = TestApp::new().await;

    for signature in [
        WEBHOOK_HASH.to_uppercase(),
        format!("{} ", WEBHOOK_HASH),
        WEBHOOK_HASH[..WEBHOOK_HASH.len() - 1].to_string(),
    ] {
        let response = app.send(webhook_request(&tx100(), Some(&signature))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(extract_json(response.into_body()).await["status"], "ignored");
    }

    assert_eq!(app.count("tickets").await, 0);
}

#[tokio::test]
async fn test_webhook_does_not_accept_admin_signing() {
    let app = TestApp::new().await;

    let mut body = tx100();
    sign_request(&mut body, ADMIN_SECRET, time::now_millis());

    let response = app.send(json_post("/api/webhook/flutterwave", &body)).await;
    assert_eq!(extract_json(response.into_body()).await["status"], "ignored");
    assert_eq!(app.count("ticket_orders").await, 0);
}

#[tokio::test]
async fn test_read_credential_cannot_delete() {
    let app = TestApp::new().await;
    let response = app.send(webhook_request(&tx100(), Some(WEBHOOK_HASH))).await;
    let ticket_id = ticket_ids(&extract_json(response.into_body()).await)[0].clone();

    let timestamp = time::now_millis();
    let hash = query_hash("GET", "/api/tickets", timestamp, ADMIN_SECRET);
    let query = format!("?timestamp={}&hash={}", timestamp, hash);

    let response = app.send(plain_request("GET", &format!("/api/tickets{}", query))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(plain_request("DELETE", &format!("/api/tickets/{}{}", ticket_id, query)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.count("tickets").await, 3);
}

#[tokio::test]
async fn test_credential_bound_to_ticket_path() {
    let app = TestApp::new().await;
    let response = app.send(webhook_request(&tx100(), Some(WEBHOOK_HASH))).await;
    let ids = ticket_ids(&extract_json(response.into_body()).await);

    let timestamp = time::now_millis();
    let hash = query_hash("DELETE", &format!("/api/tickets/{}", ids[0]), timestamp, ADMIN_SECRET);
    let uri = format!("/api/tickets/{}?timestamp={}&hash={}", ids[1], timestamp, hash);

    let response = app.send(plain_request("DELETE", &uri)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.count("tickets").await, 3);
}
