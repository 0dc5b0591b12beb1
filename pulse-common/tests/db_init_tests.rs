//! Database initialization and tenant management tests

use pulse_common::db::{init_database, settings, tenants};
use tempfile::TempDir;

#[tokio::test]
async fn test_init_creates_schema_and_defaults() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();

    for table in [
        "settings",
        "module_config",
        "tenants",
        "events",
        "seen_keys",
        "entities",
        "buckets",
        "score_records",
        "jobs",
        "notifications",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "missing table {}", table);
    }

    let window = settings::get_i64_setting(&pool, "gate_freshness_window_secs", 0)
        .await
        .unwrap();
    assert_eq!(window, 300);

    let port: i64 =
        sqlx::query_scalar("SELECT port FROM module_config WHERE module_name = 'pulse-gate'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(port, 5810);
}

#[tokio::test]
async fn test_init_is_idempotent_and_preserves_overrides() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("pulse.db");

    let pool = init_database(&db_path).await.unwrap();
    settings::set_setting(&pool, "gate_freshness_window_secs", "120")
        .await
        .unwrap();
    pool.close().await;

    // Re-init must not clobber the operator's override
    let pool = init_database(&db_path).await.unwrap();
    let window = settings::get_i64_setting(&pool, "gate_freshness_window_secs", 300)
        .await
        .unwrap();
    assert_eq!(window, 120);
}

#[tokio::test]
async fn test_settings_fall_back_on_malformed_values() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();

    settings::set_setting(&pool, "job_max_attempts", "three").await.unwrap();
    let attempts = settings::get_i64_setting(&pool, "job_max_attempts", 3).await.unwrap();
    assert_eq!(attempts, 3);

    let missing = settings::get_f64_setting(&pool, "no_such_key", 0.25).await.unwrap();
    assert_eq!(missing, 0.25);
}

#[tokio::test]
async fn test_tenant_lifecycle_create_rotate_promote() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();

    let secret = tenants::create_tenant(&pool, "tenant-1").await.unwrap();
    assert_eq!(secret.len(), 64);
    assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));

    // Creating the same tenant again is rejected
    assert!(tenants::create_tenant(&pool, "tenant-1").await.is_err());

    let loaded = tenants::get_tenant_secrets(&pool, "tenant-1").await.unwrap().unwrap();
    assert_eq!(loaded.current, secret);
    assert!(loaded.next.is_none());

    let next = tenants::rotate_tenant_secret(&pool, "tenant-1").await.unwrap();
    assert_ne!(next, secret);
    let loaded = tenants::get_tenant_secrets(&pool, "tenant-1").await.unwrap().unwrap();
    assert_eq!(loaded.current, secret);
    assert_eq!(loaded.next.as_deref(), Some(next.as_str()));

    tenants::promote_tenant_secret(&pool, "tenant-1").await.unwrap();
    let loaded = tenants::get_tenant_secrets(&pool, "tenant-1").await.unwrap().unwrap();
    assert_eq!(loaded.current, next);
    assert!(loaded.next.is_none());

    // A second promote without a staged secret is rejected
    assert!(tenants::promote_tenant_secret(&pool, "tenant-1").await.is_err());

    // Unknown tenants cannot rotate
    assert!(tenants::rotate_tenant_secret(&pool, "tenant-9").await.is_err());
    assert!(tenants::get_tenant_secrets(&pool, "tenant-9").await.unwrap().is_none());
}
