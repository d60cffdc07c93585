//! Connection setup and schema initialization for the single embedded SQLite
//! database file backing every store in this crate.
//!
//! Schema is created with plain `CREATE TABLE IF NOT EXISTS` statements
//! executed at startup rather than through `sqlx::migrate!`, mirroring how
//! the source implementation initializes its SQLite schema inline — there is
//! no separate migration runner to operate.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use aether_core::CommandCenterError;

pub type Db = SqlitePool;

/// Opens (creating if absent) the database file at `path` and ensures the
/// schema exists. Returns `FatalStartupError` on any failure — this is
/// called once at process start and a failure here must abort startup.
pub async fn connect(path: &str) -> Result<Db, CommandCenterError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CommandCenterError::fatal_startup(format!("creating db directory: {e}")))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
        .map_err(|e| CommandCenterError::fatal_startup(format!("invalid EVENT_DB_PATH: {e}")))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|e| CommandCenterError::fatal_startup(format!("connecting to database: {e}")))?;

    init_schema(&pool)
        .await
        .map_err(|e| CommandCenterError::fatal_startup(format!("schema migration failed: {e}")))?;

    Ok(pool)
}

async fn init_schema(pool: &Db) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            source TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            severity TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            payload TEXT NOT NULL,
            received_at TEXT NOT NULL,
            client_ip TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_type_ts ON events(event_type, timestamp)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_source_ts ON events(source, timestamp)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_tenant_ts ON events(tenant_id, timestamp)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_received_at ON events(received_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alert_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            severity TEXT,
            event_type TEXT,
            source TEXT,
            window_seconds INTEGER NOT NULL,
            threshold INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            tenant_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS delivery_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alert_event_id TEXT NOT NULL,
            alert_payload TEXT NOT NULL,
            webhook_url TEXT NOT NULL,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL DEFAULT 5,
            next_attempt_at TEXT NOT NULL,
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_delivery_queue_next_attempt ON delivery_queue(next_attempt_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS delivery_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            delivery_id INTEGER NOT NULL,
            alert_event_id TEXT NOT NULL,
            webhook_url TEXT NOT NULL,
            alert_payload TEXT NOT NULL DEFAULT '{}',
            outcome TEXT NOT NULL,
            attempt_count INTEGER NOT NULL,
            last_error TEXT,
            completed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dedup_history (
            rule_name TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            last_enqueued_at TEXT NOT NULL,
            PRIMARY KEY (rule_name, tenant_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS operator_audit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            target_id TEXT,
            metadata TEXT NOT NULL,
            source_ip TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
