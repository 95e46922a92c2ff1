//! admit-gate library - ticket issuance and gate admission service
//!
//! Payment webhooks become tickets exactly once; QR scans admit each ticket
//! exactly once.

use admit_common::config::GateConfig;
use admit_common::{QrCodec, Result, TicketIdGenerator};
use axum::http::{HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod checkin;
pub mod error;
pub mod issuance;
pub mod reconcile;
pub mod resolver;

use checkin::CheckInEngine;
use issuance::IssuanceEngine;

/// Caller-authentication secrets
#[derive(Clone)]
pub struct AuthSettings {
    /// Expected value of the provider's `verif-hash` header
    pub webhook_secret_hash: Arc<str>,
    /// Secret appended to signed admin/scan requests
    pub admin_secret: Arc<str>,
    /// Accepted clock skew for signed requests, in milliseconds
    pub admin_window_ms: i64,
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub ids: TicketIdGenerator,
    pub issuance: IssuanceEngine,
    pub checkin: CheckInEngine,
    pub auth: AuthSettings,
    pub cors_origin: Option<String>,
}

impl AppState {
    pub fn new(db: SqlitePool, codec: QrCodec, ids: TicketIdGenerator, auth: AuthSettings) -> Self {
        Self {
            issuance: IssuanceEngine::new(db.clone(), codec.clone(), ids.clone()),
            checkin: CheckInEngine::new(db.clone(), codec),
            db,
            ids,
            auth,
            cors_origin: None,
        }
    }

    /// Build state from resolved configuration
    pub fn from_config(db: SqlitePool, config: &GateConfig) -> Result<Self> {
        let codec = QrCodec::from_base64_key(&config.qr_secret)?;
        let ids = TicketIdGenerator::new(config.ticket_id_prefix.clone());
        let auth = AuthSettings {
            webhook_secret_hash: Arc::from(config.webhook_secret_hash.as_str()),
            admin_secret: Arc::from(config.admin_secret.as_str()),
            admin_window_ms: config.admin_request_window_ms,
        };

        let mut state = Self::new(db, codec, ids, auth);
        state.cors_origin = config.cors_origin.clone();
        Ok(state)
    }
}

/// Build application router
///
/// Scan and ticket administration require signed requests; the webhook
/// authenticates by its own header; health and build info are open.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/scan", post(api::scan_ticket))
        .route("/api/tickets", get(api::list_tickets).post(api::create_tickets))
        .route("/api/tickets/:id", get(api::get_ticket).delete(api::delete_ticket))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/api/webhook/flutterwave", post(api::flutterwave_webhook))
        .route("/api/tickets/availability", post(api::check_availability))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    let cors = cors_layer(state.cors_origin.as_deref());

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}
