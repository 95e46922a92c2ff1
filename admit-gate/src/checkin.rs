//! Check-in engine
//!
//! Gate admission: token in, outcome out. The `Issued -> CheckedIn`
//! transition is a single conditional UPDATE, so of any number of concurrent
//! scans of one ticket exactly one observes [`CheckInOutcome::Admitted`].

use admit_common::db::{tickets, AdmissionState};
use admit_common::{time, Error, QrCodec, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Non-error results of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInOutcome {
    Admitted,
    AlreadyUsed,
}

impl CheckInOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CheckInOutcome::Admitted => "Check-in successful",
            CheckInOutcome::AlreadyUsed => "Ticket already used",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckInResult {
    pub ticket_id: String,
    pub full_name: String,
    pub outcome: CheckInOutcome,
    pub checked_in_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CheckInEngine {
    db: SqlitePool,
    codec: QrCodec,
}

impl CheckInEngine {
    pub fn new(db: SqlitePool, codec: QrCodec) -> Self {
        Self { db, codec }
    }

    /// Admit the holder of `token`
    ///
    /// Errors with [`Error::InvalidToken`] for tampered or malformed tokens
    /// and [`Error::NotFound`] when the ticket no longer exists.
    pub async fn check_in(&self, token: &str) -> Result<CheckInResult> {
        let ticket_id = self.codec.decode(token)?;

        let ticket = tickets::get_ticket(&self.db, &ticket_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Ticket {}", ticket_id)))?;

        let now = time::now();
        if tickets::mark_checked_in(&self.db, &ticket_id, now).await? {
            info!(ticket_id = %ticket_id, "Ticket admitted");
            return Ok(CheckInResult {
                ticket_id,
                full_name: ticket.attendee.full_name,
                outcome: CheckInOutcome::Admitted,
                checked_in_at: Some(now),
            });
        }

        // Lost the compare-and-set: either already used, or deleted since the read
        let current = tickets::get_ticket(&self.db, &ticket_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Ticket {}", ticket_id)))?;

        if current.admission_state() != AdmissionState::CheckedIn {
            return Err(Error::Internal(format!(
                "Ticket {} neither admitted nor checked in",
                ticket_id
            )));
        }

        debug!(ticket_id = %ticket_id, "Ticket already used");
        Ok(CheckInResult {
            ticket_id,
            full_name: current.attendee.full_name,
            outcome: CheckInOutcome::AlreadyUsed,
            checked_in_at: current.checked_in_at,
        })
    }
}
