//! Gate scan endpoint

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checkin::CheckInOutcome;
use crate::error::ApiResult;
use crate::AppState;

/// Scan request; `timestamp` and `hash` are consumed by the auth middleware
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub qr_data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub ticket_id: String,
    pub full_name: String,
    pub checked_in: bool,
    pub outcome: CheckInOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// POST /api/scan
pub async fn scan_ticket(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let result = state.checkin.check_in(&request.qr_data).await?;

    Ok(Json(ScanResponse {
        ticket_id: result.ticket_id,
        full_name: result.full_name,
        checked_in: true,
        outcome: result.outcome,
        message: result.outcome.message().to_string(),
        checked_in_at: result.checked_in_at,
    }))
}
