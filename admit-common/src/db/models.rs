//! Database models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Attendee profile carried by a ticket; immutable after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub level: String,
    pub gender: String,
}

/// Payment status of an issued ticket
///
/// Tickets are only ever written for successful payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Successful,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Successful => "successful",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "successful" => Some(PaymentStatus::Successful),
            _ => None,
        }
    }
}

/// Gate-entry state of a ticket
///
/// Single transition `Issued -> CheckedIn`; `CheckedIn` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    Issued,
    CheckedIn,
}

/// Where an issuance request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSource {
    Webhook,
    Admin,
    Reconcile,
}

impl IssueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSource::Webhook => "webhook",
            IssueSource::Admin => "admin",
            IssueSource::Reconcile => "reconcile",
        }
    }
}

/// Stored ticket record
///
/// Serialises camelCase, matching the webhook and scan bodies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(rename = "ticketId")]
    pub id: String,
    pub order_ref: String,
    pub derivation_key: String,
    #[serde(flatten)]
    pub attendee: Attendee,
    pub price: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub qr_data: String,
    pub issued_at: DateTime<Utc>,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn admission_state(&self) -> AdmissionState {
        if self.checked_in {
            AdmissionState::CheckedIn
        } else {
            AdmissionState::Issued
        }
    }
}

/// Ticket row to be inserted by the issuance engine
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub id: String,
    pub order_ref: String,
    pub derivation_key: String,
    pub attendee: Attendee,
    pub price: Decimal,
    pub currency: String,
    pub qr_data: String,
}

/// Per-order claim row; its primary key serialises concurrent issuance
#[derive(Debug, Clone)]
pub struct OrderClaim {
    pub order_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub source: IssueSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_round_trip() {
        let status = PaymentStatus::Successful;
        assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        assert_eq!(PaymentStatus::parse("failed"), None);
    }

    #[test]
    fn test_ticket_serializes_flat_attendee() {
        let ticket = Ticket {
            id: "NACOS-1".to_string(),
            order_ref: "TX-1".to_string(),
            derivation_key: "TX-1-NACOS-1".to_string(),
            attendee: Attendee {
                full_name: "Ada Obi".to_string(),
                email: "ada@example.com".to_string(),
                phone: "0800".to_string(),
                department: "CS".to_string(),
                level: "100".to_string(),
                gender: "F".to_string(),
            },
            price: Decimal::new(100000, 2),
            currency: "NGN".to_string(),
            payment_status: PaymentStatus::Successful,
            qr_data: "token".to_string(),
            issued_at: Utc::now(),
            checked_in: false,
            checked_in_at: None,
        };

        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["ticketId"], "NACOS-1");
        assert_eq!(json["fullName"], "Ada Obi");
        assert_eq!(json["orderRef"], "TX-1");
        assert_eq!(json["paymentStatus"], "successful");
        assert_eq!(json["qrData"], "token");
        assert_eq!(json["checkedIn"], false);
        assert!(json.get("full_name").is_none());
        assert_eq!(json["price"], "1000.00");
        assert_eq!(ticket.admission_state(), AdmissionState::Issued);
    }
}
