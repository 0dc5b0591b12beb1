//! Notification emitter
//!
//! Turns significant score deltas into deduplicated, TTL-bounded
//! notification records for the external UI layer. The dedupe key is
//! `entity:metric:period:kind`, so a re-run of the same computation cannot
//! emit twice within the TTL.

use crate::config::ScoreConfig;
use pulse_common::events::{EventBus, PulseEvent};
use pulse_common::{time, Result};
use sqlx::SqlitePool;
use tracing::info;

const KIND_SCORE_DELTA: &str = "score_delta";

/// Emit a notification if the score moved enough; returns true when emitted
///
/// `previous = None` (first computation for the metric) emits nothing:
/// there is no delta to report.
pub async fn emit_score_delta(
    pool: &SqlitePool,
    bus: &EventBus,
    config: &ScoreConfig,
    entity_id: &str,
    metric_name: &str,
    period_key: &str,
    previous: Option<f64>,
    current: f64,
) -> Result<bool> {
    let Some(previous) = previous else {
        return Ok(false);
    };

    let delta = current - previous;
    if delta.abs() < config.notify_min_delta {
        return Ok(false);
    }

    let now = time::now();
    let dedupe_key = format!("{}:{}:{}:{}", entity_id, metric_name, period_key, KIND_SCORE_DELTA);

    // Expired rows release their dedupe key before the conditional insert
    sqlx::query("DELETE FROM notifications WHERE dedupe_key = ? AND expires_at <= ?")
        .bind(&dedupe_key)
        .bind(now)
        .execute(pool)
        .await?;

    let direction = if delta > 0.0 { "up" } else { "down" };
    let body = format!(
        "{} {} moved {} by {:.3} ({:.3} -> {:.3}) for period {}",
        entity_id, metric_name, direction, delta.abs(), previous, current, period_key
    );

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO notifications \
         (dedupe_key, entity_id, kind, metric_name, body, delta, created_at, expires_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&dedupe_key)
    .bind(entity_id)
    .bind(KIND_SCORE_DELTA)
    .bind(metric_name)
    .bind(&body)
    .bind(delta)
    .bind(now)
    .bind(now + config.notify_ttl)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(false);
    }

    info!(
        entity_id = %entity_id,
        metric_name = %metric_name,
        delta = delta,
        "Notification emitted for score delta"
    );
    bus.emit(PulseEvent::NotificationEmitted {
        entity_id: entity_id.to_string(),
        kind: KIND_SCORE_DELTA.to_string(),
        metric_name: metric_name.to_string(),
        delta,
        timestamp: now,
    });
    Ok(true)
}

/// Delete all expired notification records; returns the number removed
pub async fn sweep_expired(pool: &SqlitePool) -> Result<u64> {
    let removed = sqlx::query("DELETE FROM notifications WHERE expires_at <= ?")
        .bind(time::now())
        .execute(pool)
        .await?
        .rows_affected();
    Ok(removed)
}
