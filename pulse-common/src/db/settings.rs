//! Typed settings loading with default fallback
//!
//! Missing or malformed values fall back to the caller's default with a
//! warning; only database connection errors fail the caller.

use crate::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// Load a string setting, falling back to `default` when missing
pub async fn get_string_setting(
    pool: &SqlitePool,
    key: &str,
    default: &str,
) -> Result<String> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or_else(|| default.to_string()))
}

/// Load an integer setting, falling back to `default` when missing or invalid
pub async fn get_i64_setting(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value = get_string_setting(pool, key, &default.to_string()).await?;
    match value.parse() {
        Ok(v) => Ok(v),
        Err(_) => {
            warn!("Setting {} is not an integer ({}), using default {}", key, value, default);
            Ok(default)
        }
    }
}

/// Load a float setting, falling back to `default` when missing or invalid
pub async fn get_f64_setting(pool: &SqlitePool, key: &str, default: f64) -> Result<f64> {
    let value = get_string_setting(pool, key, &default.to_string()).await?;
    match value.parse() {
        Ok(v) => Ok(v),
        Err(_) => {
            warn!("Setting {} is not a number ({}), using default {}", key, value, default);
            Ok(default)
        }
    }
}

/// Upsert a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}
