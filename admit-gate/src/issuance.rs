//! Issuance engine
//!
//! Writes the ticket set of one logical order exactly once.
//!
//! Every issuance runs in a single transaction whose first statement inserts
//! the order's claim row. SQLite serialises writers, so concurrent deliveries
//! of the same order queue on that insert; the first commits its tickets and
//! every later one hits the claim's primary key, rolls back, and re-reads the
//! winner's set. A failure anywhere before commit leaves no tickets behind.

use crate::resolver::{DerivedTicket, OrderDerivation};
use admit_common::db::{tickets, IssueSource, NewTicket, OrderClaim, Ticket};
use admit_common::ids::derivation_key;
use admit_common::{time, Error, QrCodec, Result, TicketIdGenerator};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

/// Attempts at finding a free ticket ID before giving up
const MAX_ID_ATTEMPTS: usize = 5;

/// A written ticket as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTicket {
    pub ticket_id: String,
    pub full_name: String,
    pub tx_ref: String,
    pub qr_data: String,
    #[serde(skip)]
    pub price: Decimal,
}

impl From<Ticket> for IssuedTicket {
    fn from(ticket: Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            full_name: ticket.attendee.full_name,
            tx_ref: ticket.derivation_key,
            qr_data: ticket.qr_data,
            price: ticket.price,
        }
    }
}

/// Result of an issuance call
#[derive(Debug, Clone, PartialEq)]
pub enum IssueOutcome {
    /// This call wrote the order's tickets
    Issued(Vec<IssuedTicket>),
    /// The order was issued earlier; the existing set, unchanged
    AlreadyProcessed(Vec<IssuedTicket>),
}

impl IssueOutcome {
    pub fn tickets(&self) -> &[IssuedTicket] {
        match self {
            IssueOutcome::Issued(t) | IssueOutcome::AlreadyProcessed(t) => t,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, IssueOutcome::Issued(_))
    }
}

/// Exactly-once ticket writer
#[derive(Clone)]
pub struct IssuanceEngine {
    db: SqlitePool,
    codec: QrCodec,
    ids: TicketIdGenerator,
}

impl IssuanceEngine {
    pub fn new(db: SqlitePool, codec: QrCodec, ids: TicketIdGenerator) -> Self {
        Self { db, codec, ids }
    }

    /// Issue the tickets of `order`, or return the set already issued for it
    pub async fn issue(&self, order: &OrderDerivation, source: IssueSource) -> Result<IssueOutcome> {
        if order.tickets.is_empty() {
            return Err(Error::Validation(format!(
                "order {} derived no tickets",
                order.order_ref
            )));
        }

        let issued_at = time::now();
        let claim = OrderClaim {
            order_ref: order.order_ref.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            source,
        };

        let mut tx = self.db.begin().await?;

        match tickets::claim_order(&mut *tx, &claim, issued_at).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                tx.rollback().await?;
                debug!(order_ref = %order.order_ref, "Order already claimed");
                return self.existing(&order.order_ref).await.map(IssueOutcome::AlreadyProcessed);
            }
            Err(e) => return Err(e),
        }

        let mut issued = Vec::with_capacity(order.tickets.len());
        for derived in &order.tickets {
            let ticket = self.write_ticket(&mut tx, order, derived, issued_at).await?;
            issued.push(ticket);
        }

        tx.commit().await?;

        info!(
            order_ref = %order.order_ref,
            source = source.as_str(),
            tickets = issued.len(),
            "Issued tickets"
        );

        Ok(IssueOutcome::Issued(issued))
    }

    /// Whether an order has already been issued
    pub async fn is_issued(&self, order_ref: &str) -> Result<bool> {
        tickets::order_claimed(&self.db, order_ref).await
    }

    /// Tickets already written for an order
    pub async fn existing(&self, order_ref: &str) -> Result<Vec<IssuedTicket>> {
        let stored = tickets::tickets_for_order(&self.db, order_ref).await?;
        Ok(stored.into_iter().map(IssuedTicket::from).collect())
    }

    async fn write_ticket(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        order: &OrderDerivation,
        derived: &DerivedTicket,
        issued_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<IssuedTicket> {
        let ticket_id = self.free_ticket_id(tx, &derived.ticket_id).await?;
        let key = if ticket_id == derived.ticket_id {
            derived.derivation_key.clone()
        } else {
            derivation_key(&order.order_ref, &ticket_id)
        };
        let qr_data = self.codec.encode(&ticket_id)?;

        let new_ticket = NewTicket {
            id: ticket_id,
            order_ref: order.order_ref.clone(),
            derivation_key: key,
            attendee: derived.attendee.clone(),
            price: derived.price,
            currency: order.currency.clone(),
            qr_data,
        };
        tickets::insert_ticket(&mut **tx, &new_ticket, issued_at).await?;

        Ok(IssuedTicket {
            ticket_id: new_ticket.id,
            full_name: new_ticket.attendee.full_name,
            tx_ref: new_ticket.derivation_key,
            qr_data: new_ticket.qr_data,
            price: new_ticket.price,
        })
    }

    /// The proposed ID, or a fresh one if it is taken
    ///
    /// Runs after the claim insert, so this transaction holds the write lock
    /// and no other writer can take the ID between check and insert.
    async fn free_ticket_id(&self, tx: &mut Transaction<'static, Sqlite>, proposed: &str) -> Result<String> {
        let mut candidate = proposed.to_string();
        for _ in 0..MAX_ID_ATTEMPTS {
            if !tickets::ticket_id_exists(&mut **tx, &candidate).await? {
                return Ok(candidate);
            }
            warn!(ticket_id = %candidate, "Ticket ID collision, regenerating");
            candidate = self.ids.generate();
        }

        Err(Error::Internal(format!(
            "No free ticket ID after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }
}
