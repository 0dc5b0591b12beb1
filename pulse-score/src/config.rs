//! Configuration resolution for pulse-score

use crate::aggregate::ConfidenceLevel;
use pulse_common::db::settings::{get_f64_setting, get_i64_setting, get_string_setting};
use pulse_common::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// Scoring/scheduler tunables, loaded once at startup from the settings table
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Confidence level for Wilson intervals
    pub confidence: ConfidenceLevel,
    /// Baseline CTR used by the zero-click decomposition
    pub ctr_baseline: f64,
    /// Hard wall-clock budget per job
    pub job_timeout: std::time::Duration,
    /// Retry budget before a failed job is dead-lettered
    pub job_max_attempts: i64,
    /// Period of the failed-job retry sweep
    pub retry_sweep_interval: std::time::Duration,
    /// Idle sleep between queue polls
    pub poll_interval: std::time::Duration,
    /// Score delta that triggers a notification record
    pub notify_min_delta: f64,
    /// Notification record time-to-live
    pub notify_ttl: chrono::Duration,
    /// Outbound alert webhook; None disables alerting
    pub alert_webhook_url: Option<String>,
}

impl ScoreConfig {
    /// Load from the settings table, falling back to defaults
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let confidence_percent = get_i64_setting(pool, "score_confidence_level", 95).await?;
        let confidence = match ConfidenceLevel::from_percent(confidence_percent) {
            Some(level) => level,
            None => {
                warn!(
                    "Unsupported confidence level {} (expected 90/95/99), using 95",
                    confidence_percent
                );
                ConfidenceLevel::P95
            }
        };

        let ctr_baseline = get_f64_setting(pool, "score_ctr_baseline", 0.30).await?;
        let job_timeout_secs = get_i64_setting(pool, "job_timeout_secs", 60).await?;
        let job_max_attempts = get_i64_setting(pool, "job_max_attempts", 3).await?;
        let retry_sweep_secs = get_i64_setting(pool, "job_retry_sweep_secs", 300).await?;
        let poll_secs = get_i64_setting(pool, "job_poll_secs", 5).await?;
        let notify_min_delta = get_f64_setting(pool, "notify_min_delta", 0.05).await?;
        let notify_ttl_secs = get_i64_setting(pool, "notify_ttl_secs", 86400).await?;
        let webhook = get_string_setting(pool, "alert_webhook_url", "").await?;

        Ok(Self {
            confidence,
            ctr_baseline,
            job_timeout: std::time::Duration::from_secs(job_timeout_secs.max(1) as u64),
            job_max_attempts: job_max_attempts.max(1),
            retry_sweep_interval: std::time::Duration::from_secs(retry_sweep_secs.max(1) as u64),
            poll_interval: std::time::Duration::from_secs(poll_secs.max(1) as u64),
            notify_min_delta,
            notify_ttl: chrono::Duration::seconds(notify_ttl_secs.max(1)),
            alert_webhook_url: if webhook.is_empty() { None } else { Some(webhook) },
        })
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            confidence: ConfidenceLevel::P95,
            ctr_baseline: 0.30,
            job_timeout: std::time::Duration::from_secs(60),
            job_max_attempts: 3,
            retry_sweep_interval: std::time::Duration::from_secs(300),
            poll_interval: std::time::Duration::from_secs(5),
            notify_min_delta: 0.05,
            notify_ttl: chrono::Duration::seconds(86400),
            alert_webhook_url: None,
        }
    }
}
