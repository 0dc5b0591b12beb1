//! Database initialization
//!
//! Creates the SQLite database on first run with the full schema and
//! default settings. All table creation is idempotent; calling
//! `init_database` on an existing database is safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode: concurrent ingest readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_settings_table(&pool).await?;
    create_module_config_table(&pool).await?;
    create_tenants_table(&pool).await?;
    create_events_table(&pool).await?;
    create_seen_keys_table(&pool).await?;
    create_entities_table(&pool).await?;
    create_buckets_table(&pool).await?;
    create_score_records_table(&pool).await?;
    create_jobs_table(&pool).await?;
    create_notifications_table(&pool).await?;

    init_default_settings(&pool).await?;
    init_default_module_config(&pool).await?;

    Ok(pool)
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_module_config_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS module_config (
            module_name TEXT PRIMARY KEY,
            host TEXT NOT NULL DEFAULT '127.0.0.1',
            port INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_tenants_table(pool: &SqlitePool) -> Result<()> {
    // Two active secrets per tenant: rotation must not drop in-flight traffic
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            tenant_id TEXT PRIMARY KEY,
            signing_secret TEXT NOT NULL,
            next_signing_secret TEXT,
            created_at TEXT NOT NULL,
            rotated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    // Append-only from the guard's perspective; no updates
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            tenant_id TEXT NOT NULL,
            event_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            idempotency_key TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            received_at TEXT NOT NULL,
            payload TEXT NOT NULL,
            PRIMARY KEY (tenant_id, event_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_events_entity_sent ON events (entity_id, sent_at)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_seen_keys_table(pool: &SqlitePool) -> Result<()> {
    // Duplicate filter; INSERT OR IGNORE is the atomic set-if-not-exists
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seen_keys (
            key TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_seen_keys_expires ON seen_keys (expires_at)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_entities_table(pool: &SqlitePool) -> Result<()> {
    // undone_at supports the user-rollback check before job execution
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            entity_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            undone_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_buckets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS buckets (
            entity_id TEXT NOT NULL,
            bucket_key TEXT NOT NULL,
            granularity TEXT NOT NULL,
            impressions INTEGER NOT NULL DEFAULT 0,
            clicks INTEGER NOT NULL DEFAULT 0,
            conversions INTEGER NOT NULL DEFAULT 0,
            revenue REAL NOT NULL DEFAULT 0,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (entity_id, bucket_key)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_score_records_table(pool: &SqlitePool) -> Result<()> {
    // Append-only history: a new record supersedes but never overwrites
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS score_records (
            entity_id TEXT NOT NULL,
            metric_name TEXT NOT NULL,
            value REAL NOT NULL,
            ci_low REAL NOT NULL DEFAULT 0,
            ci_high REAL NOT NULL DEFAULT 0,
            period TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (entity_id, metric_name, computed_at)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            idempotency_key TEXT PRIMARY KEY,
            job_id TEXT NOT NULL,
            job_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            period TEXT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            dead_lettered INTEGER NOT NULL DEFAULT 0,
            enqueued_at TEXT NOT NULL,
            started_at TEXT,
            finished_at TEXT,
            failed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            dedupe_key TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            metric_name TEXT NOT NULL,
            body TEXT NOT NULL,
            delta REAL NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Seed default settings (only inserts missing keys)
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults: &[(&str, &str)] = &[
        ("gate_freshness_window_secs", "300"),
        ("gate_seen_cache_capacity", "4096"),
        ("score_confidence_level", "95"),
        ("score_ctr_baseline", "0.30"),
        ("job_timeout_secs", "60"),
        ("job_max_attempts", "3"),
        ("job_retry_sweep_secs", "300"),
        ("job_poll_secs", "5"),
        ("notify_min_delta", "0.05"),
        ("notify_ttl_secs", "86400"),
        ("alert_webhook_url", ""),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Seed default module host/port rows (only inserts missing modules)
async fn init_default_module_config(pool: &SqlitePool) -> Result<()> {
    let defaults: &[(&str, i64)] = &[("pulse-gate", 5810), ("pulse-score", 5811)];

    for (module, port) in defaults {
        sqlx::query(
            "INSERT OR IGNORE INTO module_config (module_name, host, port, enabled) \
             VALUES (?, '127.0.0.1', ?, 1)",
        )
        .bind(module)
        .bind(port)
        .execute(pool)
        .await?;
    }
    Ok(())
}
