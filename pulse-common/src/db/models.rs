//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted envelope, as persisted in the append-only event store
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub tenant_id: String,
    pub event_id: String,
    pub event_type: String,
    pub idempotency_key: String,
    pub entity_id: String,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    /// JSON-serialized payload as received
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BucketRow {
    pub entity_id: String,
    pub bucket_key: String,
    pub granularity: String,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: f64,
    pub computed_at: DateTime<Utc>,
}

/// One computed metric value with its confidence bounds
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScoreRecord {
    pub entity_id: String,
    pub metric_name: String,
    pub value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub period: String,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub idempotency_key: String,
    pub job_id: String,
    pub job_type: String,
    pub entity_id: String,
    pub period: String,
    pub status: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub dead_lettered: bool,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub dedupe_key: String,
    pub entity_id: String,
    pub kind: String,
    pub metric_name: String,
    pub body: String,
    pub delta: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
