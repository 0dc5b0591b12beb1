//! Job record persistence and state transitions
//!
//! The state machine is `queued -> running -> {completed | failed}` plus
//! `skipped` for undo-raced jobs. Every transition is a conditional UPDATE
//! keyed on the current status, so exactly one worker can win a claim and a
//! stale transition affects zero rows instead of corrupting state.

use chrono::{DateTime, Utc};
use pulse_common::db::models::JobRecord;
use pulse_common::{time, Result};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Job lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<JobStatus> {
        match value {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "skipped" => Some(JobStatus::Skipped),
            _ => None,
        }
    }

    /// Terminal states admit a superseding enqueue; non-terminal ones dedupe
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Skipped)
    }
}

/// Outcome of an enqueue call
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub job_id: String,
    /// True when a non-terminal job already held the key and the call was a
    /// no-op reporting that job's id
    pub deduped: bool,
}

/// Idempotency key: at most one non-terminal job per (entity, period)
pub fn idempotency_key(entity_id: &str, period_key: &str) -> String {
    format!("{}:{}", entity_id, period_key)
}

/// Enqueue a recompute job, deduplicating on `entity_id:period`
///
/// A non-terminal job under the same key makes this a no-op that reports
/// the existing job id ("already queued", not an error) - racing scheduling
/// triggers therefore cannot produce duplicate runs. A terminal prior job
/// is superseded by a fresh queued row under the same key.
pub async fn enqueue_job(
    pool: &SqlitePool,
    job_type: &str,
    entity_id: &str,
    period_key: &str,
) -> Result<EnqueueOutcome> {
    let key = idempotency_key(entity_id, period_key);
    let job_id = Uuid::new_v4().to_string();
    let now = time::now();

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO jobs \
         (idempotency_key, job_id, job_type, entity_id, period, status, attempts, enqueued_at) \
         VALUES (?, ?, ?, ?, ?, 'queued', 0, ?)",
    )
    .bind(&key)
    .bind(&job_id)
    .bind(job_type)
    .bind(entity_id)
    .bind(period_key)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted == 1 {
        return Ok(EnqueueOutcome { job_id, deduped: false });
    }

    // Key taken. Supersede a terminal row; dedupe against a live one. The
    // UPDATE is conditional on terminal status so a concurrent enqueue
    // cannot double-supersede.
    let superseded = sqlx::query(
        "UPDATE jobs SET job_id = ?, job_type = ?, status = 'queued', attempts = 0, \
         last_error = NULL, dead_lettered = 0, enqueued_at = ?, \
         started_at = NULL, finished_at = NULL, failed_at = NULL \
         WHERE idempotency_key = ? AND status IN ('completed', 'failed', 'skipped')",
    )
    .bind(&job_id)
    .bind(job_type)
    .bind(now)
    .bind(&key)
    .execute(pool)
    .await?
    .rows_affected();

    if superseded == 1 {
        return Ok(EnqueueOutcome { job_id, deduped: false });
    }

    let existing = get_job_by_key(pool, &key).await?.ok_or_else(|| {
        pulse_common::Error::Internal(format!("Job row vanished for key {}", key))
    })?;
    debug!(
        idempotency_key = %key,
        job_id = %existing.job_id,
        "Enqueue deduplicated against in-flight job"
    );
    Ok(EnqueueOutcome {
        job_id: existing.job_id,
        deduped: true,
    })
}

/// Claim the oldest queued job for execution
///
/// The `queued -> running` transition succeeds only if the row is still
/// queued when the UPDATE runs; losing a race to another worker just means
/// trying the next row.
pub async fn claim_next_queued(pool: &SqlitePool) -> Result<Option<JobRecord>> {
    loop {
        let candidate: Option<JobRecord> = sqlx::query_as(
            "SELECT * FROM jobs WHERE status = 'queued' ORDER BY enqueued_at LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        let Some(job) = candidate else {
            return Ok(None);
        };

        let claimed = sqlx::query(
            "UPDATE jobs SET status = 'running', started_at = ?, attempts = attempts + 1 \
             WHERE idempotency_key = ? AND status = 'queued'",
        )
        .bind(time::now())
        .bind(&job.idempotency_key)
        .execute(pool)
        .await?
        .rows_affected();

        if claimed == 1 {
            return Ok(get_job_by_key(pool, &job.idempotency_key).await?);
        }
        // Another worker won this row; look again
    }
}

/// Transition a running job to completed
pub async fn complete_job(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query(
        "UPDATE jobs SET status = 'completed', finished_at = ? \
         WHERE idempotency_key = ? AND status = 'running'",
    )
    .bind(time::now())
    .bind(key)
    .execute(pool)
    .await?;
    Ok(())
}

/// Transition a running job to skipped (target was undone since enqueue)
pub async fn skip_job(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query(
        "UPDATE jobs SET status = 'skipped', finished_at = ? \
         WHERE idempotency_key = ? AND status = 'running'",
    )
    .bind(time::now())
    .bind(key)
    .execute(pool)
    .await?;
    Ok(())
}

/// Maximum stored error-message length; longer messages are truncated
const MAX_ERROR_LEN: usize = 500;

/// Transition a running job to failed, annotating the error
pub async fn fail_job(pool: &SqlitePool, key: &str, error: &str) -> Result<()> {
    let mut message = error.to_string();
    if message.len() > MAX_ERROR_LEN {
        let mut cut = MAX_ERROR_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }

    let now = time::now();
    sqlx::query(
        "UPDATE jobs SET status = 'failed', last_error = ?, failed_at = ?, finished_at = ? \
         WHERE idempotency_key = ? AND status = 'running'",
    )
    .bind(&message)
    .bind(now)
    .bind(now)
    .bind(key)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch a job by its idempotency key
pub async fn get_job_by_key(pool: &SqlitePool, key: &str) -> Result<Option<JobRecord>> {
    let job = sqlx::query_as("SELECT * FROM jobs WHERE idempotency_key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// Fetch a job by its public job id
pub async fn get_job_by_id(pool: &SqlitePool, job_id: &str) -> Result<Option<JobRecord>> {
    let job = sqlx::query_as("SELECT * FROM jobs WHERE job_id = ?")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// Result of one retry sweep pass
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub requeued: u64,
    /// Jobs that exhausted their attempts budget this pass
    pub dead_lettered: Vec<JobRecord>,
}

/// Re-queue failed jobs with remaining attempts; dead-letter the rest
///
/// Runs on a schedule rather than inline in the failure path, so one bad
/// job cannot hold a request hostage and retries survive process restarts.
pub async fn retry_sweep(pool: &SqlitePool, max_attempts: i64) -> Result<SweepOutcome> {
    let requeued = sqlx::query(
        "UPDATE jobs SET status = 'queued' \
         WHERE status = 'failed' AND dead_lettered = 0 AND attempts < ?",
    )
    .bind(max_attempts)
    .execute(pool)
    .await?
    .rows_affected();

    let exhausted: Vec<JobRecord> = sqlx::query_as(
        "SELECT * FROM jobs WHERE status = 'failed' AND dead_lettered = 0 AND attempts >= ?",
    )
    .bind(max_attempts)
    .fetch_all(pool)
    .await?;

    for job in &exhausted {
        sqlx::query("UPDATE jobs SET dead_lettered = 1 WHERE idempotency_key = ?")
            .bind(&job.idempotency_key)
            .execute(pool)
            .await?;
    }

    Ok(SweepOutcome {
        requeued,
        dead_lettered: exhausted,
    })
}

/// Record a user-initiated rollback for an entity
pub async fn mark_entity_undone(
    pool: &SqlitePool,
    entity_id: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE entities SET undone_at = ? WHERE entity_id = ?")
        .bind(at)
        .bind(entity_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Read an entity's rollback timestamp, if any
pub async fn entity_undone_at(
    pool: &SqlitePool,
    entity_id: &str,
) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(Option<DateTime<Utc>>,)> =
        sqlx::query_as("SELECT undone_at FROM entities WHERE entity_id = ?")
            .bind(entity_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(undone_at,)| undone_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_format() {
        assert_eq!(idempotency_key("dealer-1", "2026-03-01"), "dealer-1:2026-03-01");
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Skipped,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Skipped.is_terminal());
    }
}
