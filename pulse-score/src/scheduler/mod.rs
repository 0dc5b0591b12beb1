//! Job Scheduler - periodic recomputation with per-key exactly-once claims
//!
//! All job state lives in the `jobs` table; the loops here are stateless
//! drivers. Multiple pulse-score instances can run the same loops safely:
//! the conditional `queued -> running` transition guarantees at most one
//! runner per idempotency key.

pub mod store;
pub mod worker;

pub use store::{
    claim_next_queued, enqueue_job, get_job_by_id, idempotency_key, retry_sweep, EnqueueOutcome,
    JobStatus, SweepOutcome,
};
pub use worker::{granularity_for_job_type, job_type_for_granularity, run_job};

use crate::aggregate::{Granularity, Period};
use crate::AppState;
use pulse_common::{time, Result};
use tracing::{error, info};

/// Enqueue one recompute job per known entity for the just-closed period
///
/// Safe to trigger repeatedly (cron retries, racing triggers): per-key
/// dedupe turns repeats into no-ops against the in-flight jobs.
pub async fn enqueue_sweep(state: &AppState, granularity: Granularity) -> Result<Vec<EnqueueOutcome>> {
    let period = Period::previous(granularity, time::now()).ok_or_else(|| {
        pulse_common::Error::Internal("Could not resolve previous period".to_string())
    })?;

    let entities: Vec<(String,)> = sqlx::query_as("SELECT entity_id FROM entities ORDER BY entity_id")
        .fetch_all(&state.db)
        .await?;

    let job_type = job_type_for_granularity(granularity);
    let mut outcomes = Vec::with_capacity(entities.len());
    for (entity_id,) in entities {
        outcomes.push(enqueue_job(&state.db, job_type, &entity_id, &period.key).await?);
    }

    info!(
        granularity = granularity.as_str(),
        period = %period.key,
        jobs = outcomes.len(),
        "Sweep enqueued"
    );
    Ok(outcomes)
}

/// Claim-and-run loop; spawned once per worker task
pub async fn run_scheduler_loop(state: AppState) {
    info!("Scheduler loop started");
    loop {
        match claim_next_queued(&state.db).await {
            Ok(Some(job)) => {
                if let Err(e) = run_job(&state, &job).await {
                    // Transition-level storage error; the job itself was
                    // already annotated where possible
                    error!(job_id = %job.job_id, "Scheduler transition error: {}", e);
                }
            }
            Ok(None) => {
                tokio::time::sleep(state.config.poll_interval).await;
            }
            Err(e) => {
                error!("Scheduler claim error: {}", e);
                tokio::time::sleep(state.config.poll_interval).await;
            }
        }
    }
}

/// Periodic retry sweep; re-queues retryable failures, dead-letters the rest
pub async fn run_retry_sweep_loop(state: AppState) {
    info!(
        interval_secs = state.config.retry_sweep_interval.as_secs(),
        "Retry sweep loop started"
    );
    let mut ticker = tokio::time::interval(state.config.retry_sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match crate::notifier::sweep_expired(&state.db).await {
            Ok(removed) if removed > 0 => {
                info!(removed = removed, "Expired notification records swept")
            }
            Ok(_) => {}
            Err(e) => error!("Notification expiry sweep error: {}", e),
        }

        match retry_sweep(&state.db, state.config.job_max_attempts).await {
            Ok(outcome) => {
                if outcome.requeued > 0 {
                    info!(requeued = outcome.requeued, "Retry sweep re-queued failed jobs");
                }
                for job in &outcome.dead_lettered {
                    error!(
                        job_id = %job.job_id,
                        entity_id = %job.entity_id,
                        attempts = job.attempts,
                        "Job dead-lettered after exhausting retries"
                    );
                    state.alerter.job_dead_lettered(job).await;
                }
            }
            Err(e) => error!("Retry sweep error: {}", e),
        }
    }
}
