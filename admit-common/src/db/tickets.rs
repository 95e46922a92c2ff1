//! Ticket store queries
//!
//! Every function runs exactly one statement against the given executor, so
//! callers choose the scope: a pool for standalone reads, or `&mut *tx` to
//! run inside an issuance transaction.

use super::models::{Attendee, NewTicket, OrderClaim, PaymentStatus, Ticket};
use crate::{time, Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

const TICKET_COLUMNS: &str = r#"
    id, order_ref, derivation_key, full_name, email, phone, department, level, gender,
    price, currency, payment_status, qr_data, issued_at, checked_in, checked_in_at
"#;

/// Stored timestamp format; fixed width so text ordering is chronological
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Insert the claim row for an order
///
/// Fails with a unique violation (see [`Error::is_unique_violation`]) when the
/// order has already been claimed.
pub async fn claim_order<'c>(
    ex: impl SqliteExecutor<'c>,
    claim: &OrderClaim,
    issued_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ticket_orders (order_ref, amount, currency, source, issued_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&claim.order_ref)
    .bind(claim.amount.to_string())
    .bind(&claim.currency)
    .bind(claim.source.as_str())
    .bind(format_timestamp(issued_at))
    .execute(ex)
    .await?;

    Ok(())
}

/// Whether an order has already been claimed
pub async fn order_claimed<'c>(ex: impl SqliteExecutor<'c>, order_ref: &str) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM ticket_orders WHERE order_ref = ?")
            .bind(order_ref)
            .fetch_optional(ex)
            .await?;

    Ok(found.is_some())
}

/// Insert one ticket row
pub async fn insert_ticket<'c>(
    ex: impl SqliteExecutor<'c>,
    ticket: &NewTicket,
    issued_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tickets (
            id, order_ref, derivation_key, full_name, email, phone, department, level,
            gender, price, currency, payment_status, qr_data, issued_at, checked_in
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&ticket.id)
    .bind(&ticket.order_ref)
    .bind(&ticket.derivation_key)
    .bind(&ticket.attendee.full_name)
    .bind(&ticket.attendee.email)
    .bind(&ticket.attendee.phone)
    .bind(&ticket.attendee.department)
    .bind(&ticket.attendee.level)
    .bind(&ticket.attendee.gender)
    .bind(ticket.price.to_string())
    .bind(&ticket.currency)
    .bind(PaymentStatus::Successful.as_str())
    .bind(&ticket.qr_data)
    .bind(format_timestamp(issued_at))
    .execute(ex)
    .await?;

    Ok(())
}

/// Whether a ticket ID is already taken
pub async fn ticket_id_exists<'c>(ex: impl SqliteExecutor<'c>, id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tickets WHERE id = ?")
        .bind(id)
        .fetch_optional(ex)
        .await?;

    Ok(found.is_some())
}

/// All tickets of one logical order, in issuance order
pub async fn tickets_for_order<'c>(ex: impl SqliteExecutor<'c>, order_ref: &str) -> Result<Vec<Ticket>> {
    let sql = format!(
        "SELECT {} FROM tickets WHERE order_ref = ? ORDER BY rowid ASC",
        TICKET_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(order_ref).fetch_all(ex).await?;

    rows.iter().map(ticket_from_row).collect()
}

/// Load one ticket by ID
pub async fn get_ticket<'c>(ex: impl SqliteExecutor<'c>, id: &str) -> Result<Option<Ticket>> {
    let sql = format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(ex).await?;

    row.as_ref().map(ticket_from_row).transpose()
}

/// All tickets, newest first
pub async fn list_tickets<'c>(ex: impl SqliteExecutor<'c>) -> Result<Vec<Ticket>> {
    let sql = format!(
        "SELECT {} FROM tickets ORDER BY issued_at DESC, rowid DESC",
        TICKET_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(ex).await?;

    rows.iter().map(ticket_from_row).collect()
}

/// Irreversibly remove a ticket; returns false if it did not exist
pub async fn delete_ticket<'c>(ex: impl SqliteExecutor<'c>, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tickets WHERE id = ?")
        .bind(id)
        .execute(ex)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Atomic compare-and-set of the admission flag
///
/// Returns true only for the single caller that moved the ticket from
/// `checked_in = 0` to `checked_in = 1`.
pub async fn mark_checked_in<'c>(
    ex: impl SqliteExecutor<'c>,
    id: &str,
    at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE tickets SET checked_in = 1, checked_in_at = ? WHERE id = ? AND checked_in = 0",
    )
    .bind(format_timestamp(at))
    .bind(id)
    .execute(ex)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// First ticket matching an email (case-insensitive) or a non-empty phone
pub async fn find_by_contact<'c>(
    ex: impl SqliteExecutor<'c>,
    email: &str,
    phone: &str,
) -> Result<Option<Ticket>> {
    let sql = format!(
        "SELECT {} FROM tickets WHERE email = ? COLLATE NOCASE OR (? != '' AND phone = ?) LIMIT 1",
        TICKET_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(email)
        .bind(phone)
        .bind(phone)
        .fetch_optional(ex)
        .await?;

    row.as_ref().map(ticket_from_row).transpose()
}

fn ticket_from_row(row: &SqliteRow) -> Result<Ticket> {
    let price_raw: String = row.try_get("price")?;
    let price = Decimal::from_str(&price_raw)
        .map_err(|e| Error::Internal(format!("Stored price {:?} is not a decimal: {}", price_raw, e)))?;

    let status_raw: String = row.try_get("payment_status")?;
    let payment_status = PaymentStatus::parse(&status_raw)
        .ok_or_else(|| Error::Internal(format!("Unknown payment status {:?}", status_raw)))?;

    let issued_raw: String = row.try_get("issued_at")?;
    let issued_at = time::parse_rfc3339(&issued_raw)
        .ok_or_else(|| Error::Internal(format!("Bad issued_at {:?}", issued_raw)))?;

    let checked_in_at = row
        .try_get::<Option<String>, _>("checked_in_at")?
        .and_then(|s| time::parse_rfc3339(&s));

    Ok(Ticket {
        id: row.try_get("id")?,
        order_ref: row.try_get("order_ref")?,
        derivation_key: row.try_get("derivation_key")?,
        attendee: Attendee {
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            department: row.try_get("department")?,
            level: row.try_get("level")?,
            gender: row.try_get("gender")?,
        },
        price,
        currency: row.try_get("currency")?,
        payment_status,
        qr_data: row.try_get("qr_data")?,
        issued_at,
        checked_in: row.try_get::<i64, _>("checked_in")? != 0,
        checked_in_at,
    })
}
