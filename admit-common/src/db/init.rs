//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up to date.
//! All statements are idempotent; safe to run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

/// Per-connection wait for the SQLite write lock
///
/// Concurrent issuance transactions for the same order queue on this lock.
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL: concurrent readers with one writer. Busy timeout and foreign keys
    // are per-connection settings, so they go on the connect options.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema_version_table(&pool).await?;
    create_ticket_orders_table(&pool).await?;
    create_tickets_table(&pool).await?;
    record_schema_version(&pool).await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per logical order that has been issued
///
/// The primary key on `order_ref` is what makes issuance exactly-once: the
/// claim insert is the first write of every issuance transaction.
async fn create_ticket_orders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ticket_orders (
            order_ref TEXT PRIMARY KEY,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            source TEXT NOT NULL,
            issued_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tickets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tickets (
            id TEXT PRIMARY KEY,
            derivation_key TEXT NOT NULL UNIQUE,
            order_ref TEXT NOT NULL REFERENCES ticket_orders(order_ref),
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            department TEXT NOT NULL,
            level TEXT NOT NULL,
            gender TEXT NOT NULL,
            price TEXT NOT NULL,
            currency TEXT NOT NULL,
            payment_status TEXT NOT NULL,
            qr_data TEXT NOT NULL,
            issued_at TEXT NOT NULL,
            checked_in INTEGER NOT NULL DEFAULT 0 CHECK (checked_in IN (0, 1)),
            checked_in_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_tickets_order_ref ON tickets(order_ref)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_tickets_email_phone ON tickets(email, phone)")
        .execute(pool)
        .await?;

    // checked_in is write-once true
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS tickets_checked_in_monotonic
        BEFORE UPDATE OF checked_in ON tickets
        WHEN OLD.checked_in = 1 AND NEW.checked_in = 0
        BEGIN
            SELECT RAISE(ABORT, 'checked_in cannot be reset');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}
