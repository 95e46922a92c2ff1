//! Tests for database initialization

use admit_common::db::init::{init_database, SCHEMA_VERSION};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("tickets.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("tickets.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    // Schema creation is idempotent
    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("tickets.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(tables, vec!["schema_version", "ticket_orders", "tickets"]);
}

#[tokio::test]
async fn test_schema_version_recorded_once() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("tickets.db");
    init_database(&db_path).await.unwrap();
    let pool = init_database(&db_path).await.unwrap();

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(&pool)
        .await
        .unwrap();

    assert_eq!(versions, vec![SCHEMA_VERSION]);
}

#[tokio::test]
async fn test_wal_mode_enabled() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("tickets.db")).await.unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_derivation_key_unique() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("tickets.db")).await.unwrap();

    sqlx::query(
        "INSERT INTO ticket_orders (order_ref, amount, currency, source, issued_at) VALUES ('TX', '1', 'NGN', 'webhook', '2026-01-01T00:00:00.000000Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let insert = |id: &'static str| {
        sqlx::query(
            r#"
            INSERT INTO tickets (id, derivation_key, order_ref, full_name, email, phone, department,
                                 level, gender, price, currency, payment_status, qr_data, issued_at)
            VALUES (?, 'TX-DUP', 'TX', 'A', 'a@x.com', '', 'N/A', 'N/A', 'N/A', '1', 'NGN',
                    'successful', 'qr', '2026-01-01T00:00:00.000000Z')
            "#,
        )
        .bind(id)
    };

    insert("T1").execute(&pool).await.unwrap();
    let err = insert("T2").execute(&pool).await.unwrap_err();
    let is_unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    assert!(is_unique, "expected unique violation, got {:?}", err);
}
