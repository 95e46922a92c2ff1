//! Payment provider webhook
//!
//! Every delivery is acknowledged with 200 unless the store fails, so the
//! provider never retries an event that was deliberately ignored.

use admit_common::api::verify_webhook_signature;
use admit_common::db::IssueSource;
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ApiResult;
use crate::issuance::{IssueOutcome, IssuedTicket};
use crate::resolver;
use crate::AppState;

/// Header carrying the provider's shared secret hash
pub const SIGNATURE_HEADER: &str = "verif-hash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Ignored,
    IgnoredNotSuccessful,
    RejectedInvalidPayload,
    AlreadyProcessed,
    Success,
}

/// Body returned for webhook deliveries and administrative creation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub status: IssueStatus,
    pub tickets_created: usize,
    pub tickets: Vec<IssuedTicket>,
}

impl IssueResponse {
    pub fn empty(status: IssueStatus) -> Self {
        Self {
            status,
            tickets_created: 0,
            tickets: Vec::new(),
        }
    }
}

impl From<IssueOutcome> for IssueResponse {
    fn from(outcome: IssueOutcome) -> Self {
        match outcome {
            IssueOutcome::Issued(tickets) => Self {
                status: IssueStatus::Success,
                tickets_created: tickets.len(),
                tickets,
            },
            IssueOutcome::AlreadyProcessed(tickets) => Self {
                status: IssueStatus::AlreadyProcessed,
                tickets_created: 0,
                tickets,
            },
        }
    }
}

/// POST /api/webhook/flutterwave
pub async fn flutterwave_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IssueResponse>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if verify_webhook_signature(signature, &state.auth.webhook_secret_hash).is_err() {
        warn!("Webhook signature mismatch, ignoring delivery");
        return Ok(Json(IssueResponse::empty(IssueStatus::Ignored)));
    }

    let notification = match resolver::parse_notification(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Rejecting webhook payload");
            return Ok(Json(IssueResponse::empty(IssueStatus::RejectedInvalidPayload)));
        }
    };

    let tx_ref = notification.data.tx_ref.clone();
    let order = match resolver::resolve(&notification.data, &state.ids) {
        Ok(Some(order)) => order,
        Ok(None) => {
            debug!(tx_ref = %tx_ref, status = %notification.data.status, "Payment not successful");
            return Ok(Json(IssueResponse::empty(IssueStatus::IgnoredNotSuccessful)));
        }
        Err(e) => {
            warn!(tx_ref = %tx_ref, error = %e, "Rejecting webhook payload");
            return Ok(Json(IssueResponse::empty(IssueStatus::RejectedInvalidPayload)));
        }
    };

    let outcome = state.issuance.issue(&order, IssueSource::Webhook).await?;
    if !outcome.is_new() {
        info!(tx_ref = %tx_ref, "Duplicate delivery, order already processed");
    }

    Ok(Json(outcome.into()))
}
