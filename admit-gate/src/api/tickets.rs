//! Ticket administration endpoints

use admit_common::db::{tickets, IssueSource, Ticket};
use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::webhook::IssueResponse;
use crate::error::{ApiError, ApiResult};
use crate::resolver::{self, AttendeeInput, PayerContact};
use crate::AppState;

/// Currency assumed when an administrative order names none
const DEFAULT_CURRENCY: &str = "NGN";

/// Administrative order; `timestamp` and `hash` are consumed by the auth middleware
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminTicketRequest {
    pub tx_ref: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Order total; required unless every attendee carries a price
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    pub attendees: Vec<AttendeeInput>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// GET /api/tickets
pub async fn list_tickets(State(state): State<AppState>) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(tickets::list_tickets(&state.db).await?))
}

/// GET /api/tickets/:id
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ticket>> {
    tickets::get_ticket(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {}", id)))
}

/// DELETE /api/tickets/:id
pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !tickets::delete_ticket(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("Ticket {}", id)));
    }

    info!(ticket_id = %id, "Ticket deleted");
    Ok(Json(json!({ "message": "Ticket deleted" })))
}

/// POST /api/tickets
///
/// Same resolver and idempotency guard as the webhook.
pub async fn create_tickets(
    State(state): State<AppState>,
    Json(request): Json<AdminTicketRequest>,
) -> ApiResult<Json<IssueResponse>> {
    let amount = match request.amount {
        Some(amount) => amount,
        None => {
            let prices = request
                .attendees
                .iter()
                .map(|a| a.price)
                .collect::<Option<Vec<Decimal>>>()
                .ok_or_else(|| {
                    ApiError::BadRequest("amount is required when attendee prices are missing".to_string())
                })?;
            resolver::checked_sum(prices)
                .ok_or_else(|| ApiError::BadRequest("attendee prices overflow".to_string()))?
        }
    };

    let payer = PayerContact {
        name: None,
        email: request.email.trim().to_string(),
        phone: request.phone.trim().to_string(),
    };
    let currency = request.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);

    let order = resolver::derive_order(
        &request.tx_ref,
        amount,
        currency,
        &payer,
        request.attendees,
        &state.ids,
    )?;

    let outcome = state.issuance.issue(&order, IssueSource::Admin).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/tickets/availability
///
/// Pre-payment duplicate check on contact details.
pub async fn check_availability(
    State(state): State<AppState>,
    Json(request): Json<AvailabilityRequest>,
) -> ApiResult<Json<AvailabilityResponse>> {
    let email = request.email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("email is required".to_string()));
    }
    let phone = request.phone.trim();

    let response = match tickets::find_by_contact(&state.db, email, phone).await? {
        None => AvailabilityResponse {
            available: true,
            reason: None,
        },
        Some(existing) => {
            let field = if existing.attendee.email.eq_ignore_ascii_case(email) {
                "email"
            } else {
                "phone number"
            };
            AvailabilityResponse {
                available: false,
                reason: Some(format!("A ticket already exists for this {}", field)),
            }
        }
    };

    Ok(Json(response))
}
