//! Job execution
//!
//! Drives one recompute job end to end: undo check, up-front sample fetch,
//! pure aggregation + scoring, one all-or-nothing write transaction, then
//! notifications. Failures are caught and annotated onto the job record;
//! one job's failure never affects another job or the scheduler's liveness.

use crate::aggregate::{aggregate, BucketStat, Granularity, Period};
use crate::notifier;
use crate::scheduler::store;
use crate::scoring::{
    clamp01, harm_rate, quality_index, risk_quality_index, visibility_composite, zero_click,
    PlatformVisibility, QualityInputs, ZeroClickInputs,
};
use crate::AppState;
use pulse_common::db::models::{EventRecord, JobRecord};
use pulse_common::envelope::{EventPayload, MetricSample};
use pulse_common::events::PulseEvent;
use pulse_common::{time, Error, Result};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{error, info, warn};

/// Job types understood by the worker
pub fn granularity_for_job_type(job_type: &str) -> Option<Granularity> {
    match job_type {
        "recompute_day" => Some(Granularity::Day),
        "recompute_week" => Some(Granularity::Week),
        "recompute_month" => Some(Granularity::Month),
        _ => None,
    }
}

pub fn job_type_for_granularity(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Day => "recompute_day",
        Granularity::Week => "recompute_week",
        Granularity::Month => "recompute_month",
    }
}

/// Run a future under a hard wall-clock budget; None means it timed out
pub async fn with_budget<T>(
    budget: std::time::Duration,
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::time::timeout(budget, fut).await.ok()
}

/// Execute one claimed (running) job to a terminal state
///
/// Never returns an error for job-level failures; those land on the job
/// record and the alert channel. Only storage errors on the transitions
/// themselves propagate.
pub async fn run_job(state: &AppState, job: &JobRecord) -> Result<()> {
    // Undo check: a user-initiated rollback after enqueue must win over the
    // recompute. Check-then-skip is a correctness property, not an
    // optimization.
    if let Some(undone_at) = store::entity_undone_at(&state.db, &job.entity_id).await? {
        if undone_at > job.enqueued_at {
            info!(
                job_id = %job.job_id,
                entity_id = %job.entity_id,
                "Target entity undone since enqueue, skipping job"
            );
            store::skip_job(&state.db, &job.idempotency_key).await?;
            return Ok(());
        }
    }

    match with_budget(state.config.job_timeout, execute_compute(state, job)).await {
        Some(Ok(())) => {
            store::complete_job(&state.db, &job.idempotency_key).await?;
            info!(job_id = %job.job_id, entity_id = %job.entity_id, period = %job.period, "Job completed");
            state.event_bus.emit(PulseEvent::JobCompleted {
                job_id: job.job_id.clone(),
                entity_id: job.entity_id.clone(),
                period: job.period.clone(),
                timestamp: time::now(),
            });
        }
        Some(Err(e)) => {
            let message = e.to_string();
            error!(job_id = %job.job_id, entity_id = %job.entity_id, "Job failed: {}", message);
            store::fail_job(&state.db, &job.idempotency_key, &message).await?;
            state.alerter.job_failed(job, &message).await;
            state.event_bus.emit(PulseEvent::JobFailed {
                job_id: job.job_id.clone(),
                entity_id: job.entity_id.clone(),
                error: message,
                timestamp: time::now(),
            });
        }
        None => {
            warn!(
                job_id = %job.job_id,
                entity_id = %job.entity_id,
                budget_secs = state.config.job_timeout.as_secs(),
                "Job exceeded wall-clock budget"
            );
            store::fail_job(&state.db, &job.idempotency_key, "timeout").await?;
            state.alerter.job_failed(job, "timeout").await;
            state.event_bus.emit(PulseEvent::JobFailed {
                job_id: job.job_id.clone(),
                entity_id: job.entity_id.clone(),
                error: "timeout".to_string(),
                timestamp: time::now(),
            });
        }
    }
    Ok(())
}

/// Counters folded out of the non-signal payloads in the period
#[derive(Debug, Default)]
struct SidecarCounters {
    review_count: i64,
    negative_count: i64,
    gbp_impressions: i64,
    gbp_actions: i64,
    ai_presence_sum: f64,
    ai_presence_samples: i64,
}

/// The recompute pipeline: fetch, aggregate, score, write, notify
async fn execute_compute(state: &AppState, job: &JobRecord) -> Result<()> {
    let granularity = granularity_for_job_type(&job.job_type)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown job type: {}", job.job_type)))?;
    let period = Period::from_key(granularity, &job.period)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid period key: {}", job.period)))?;

    // All inputs are fetched up front; aggregation and scoring below are
    // pure CPU with no I/O.
    let rows: Vec<EventRecord> = sqlx::query_as("SELECT * FROM events WHERE entity_id = ?")
        .bind(&job.entity_id)
        .fetch_all(&state.db)
        .await?;

    let mut signals: Vec<MetricSample> = Vec::new();
    let mut sidecar = SidecarCounters::default();

    for record in rows {
        let value: serde_json::Value = match serde_json::from_str(&record.payload) {
            Ok(value) => value,
            Err(e) => {
                // Validated at ingest; a decode failure here is a defect
                warn!(entity_id = %job.entity_id, "Stored payload failed to decode: {}", e);
                continue;
            }
        };
        let Some(payload) = EventPayload::decode(&record.event_type, &value) else {
            continue;
        };
        let ts = payload.timestamp();
        if ts < period.start || ts >= period.end {
            continue;
        }

        match payload {
            EventPayload::Signal(sample) => signals.push(sample),
            EventPayload::Review(review) => {
                sidecar.review_count += review.review_count;
                sidecar.negative_count += review.negative_count;
            }
            EventPayload::Citation(citation) => {
                sidecar.gbp_impressions += citation.gbp_impressions;
                sidecar.gbp_actions += citation.gbp_actions;
                sidecar.ai_presence_sum += citation.ai_presence_rate;
                sidecar.ai_presence_samples += 1;
            }
        }
    }

    let stats = aggregate(&signals, granularity, state.config.confidence);
    let bucket = stats
        .into_iter()
        .find(|stat| stat.bucket_key == period.key)
        .unwrap_or_else(|| empty_bucket(&period.key));

    // Per-channel visibility: each channel's CTR weighted by its impression
    // share, so the weights sum to 1 whenever any impressions exist
    let platforms = channel_visibilities(&signals);
    let visibility = visibility_composite(&platforms);

    let harm = harm_rate(sidecar.negative_count, sidecar.review_count, 1.0);
    let quality = quality_index(&QualityInputs {
        // Wilson lower bound: conservative SEO signal at low volume
        seo: bucket.ctr_ci.0,
        visibility,
        velocity: clamp01(bucket.cvr),
        harm_rate: harm,
        risk_multiplier: risk_quality_index(&[1.0 + harm], 1.0),
        ..QualityInputs::default()
    });

    let ai_presence_rate = if sidecar.ai_presence_samples > 0 {
        clamp01(sidecar.ai_presence_sum / sidecar.ai_presence_samples as f64)
    } else {
        0.0
    };
    let decomposition = zero_click(&ZeroClickInputs {
        ctr_actual: bucket.ctr,
        ctr_baseline: state.config.ctr_baseline,
        gbp_impressions: sidecar.gbp_impressions,
        gbp_actions: sidecar.gbp_actions,
        ai_presence_rate,
    });

    let computed_at = time::now();
    let records: Vec<(&str, f64, f64, f64)> = vec![
        ("ctr", bucket.ctr, bucket.ctr_ci.0, bucket.ctr_ci.1),
        ("cvr", bucket.cvr, bucket.cvr_ci.0, bucket.cvr_ci.1),
        ("visibility_composite", visibility, visibility, visibility),
        ("quality_index", quality, quality, quality),
        (
            "adjusted_zero_click",
            decomposition.adjusted_zero_click,
            decomposition.adjusted_zero_click,
            decomposition.adjusted_zero_click,
        ),
    ];

    // Previous values (for delta notifications) read before the new rows land
    let mut previous: BTreeMap<String, f64> = BTreeMap::new();
    for &(metric, _, _, _) in &records {
        let row: Option<(f64,)> = sqlx::query_as(
            "SELECT value FROM score_records WHERE entity_id = ? AND metric_name = ? \
             ORDER BY computed_at DESC LIMIT 1",
        )
        .bind(&job.entity_id)
        .bind(metric)
        .fetch_optional(&state.db)
        .await?;
        if let Some((value,)) = row {
            previous.insert(metric.to_string(), value);
        }
    }

    // All-or-nothing: bucket replace + every ScoreRecord in one transaction
    let mut tx = state.db.begin().await?;

    sqlx::query(
        "INSERT OR REPLACE INTO buckets \
         (entity_id, bucket_key, granularity, impressions, clicks, conversions, revenue, computed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&job.entity_id)
    .bind(&period.key)
    .bind(granularity.as_str())
    .bind(bucket.impressions)
    .bind(bucket.clicks)
    .bind(bucket.conversions)
    .bind(bucket.revenue)
    .bind(computed_at)
    .execute(&mut *tx)
    .await?;

    for &(metric, value, ci_low, ci_high) in &records {
        sqlx::query(
            "INSERT INTO score_records \
             (entity_id, metric_name, value, ci_low, ci_high, period, computed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.entity_id)
        .bind(metric)
        .bind(value)
        .bind(ci_low)
        .bind(ci_high)
        .bind(&period.key)
        .bind(computed_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    for &(metric, value, _, _) in &records {
        state.event_bus.emit(PulseEvent::ScoreComputed {
            entity_id: job.entity_id.clone(),
            metric_name: metric.to_string(),
            value,
            timestamp: computed_at,
        });
        notifier::emit_score_delta(
            &state.db,
            &state.event_bus,
            &state.config,
            &job.entity_id,
            metric,
            &period.key,
            previous.get(metric).copied(),
            value,
        )
        .await?;
    }

    Ok(())
}

fn empty_bucket(key: &str) -> BucketStat {
    BucketStat {
        bucket_key: key.to_string(),
        impressions: 0,
        clicks: 0,
        conversions: 0,
        revenue: 0.0,
        ctr: 0.0,
        ctr_ci: (0.0, 0.0),
        cvr: 0.0,
        cvr_ci: (0.0, 0.0),
    }
}

/// Fold signals into per-channel visibility weighted by impression share
fn channel_visibilities(signals: &[MetricSample]) -> Vec<PlatformVisibility> {
    let mut by_channel: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for sample in signals {
        let entry = by_channel.entry(sample.channel.as_str()).or_insert((0, 0));
        entry.0 += sample.impressions;
        entry.1 += sample.clicks;
    }

    let total_impressions: i64 = by_channel.values().map(|(impressions, _)| impressions).sum();
    if total_impressions <= 0 {
        return Vec::new();
    }

    by_channel
        .into_values()
        .map(|(impressions, clicks)| PlatformVisibility {
            visibility: if impressions > 0 {
                clamp01(clicks as f64 / impressions as f64)
            } else {
                0.0
            },
            weight: impressions as f64 / total_impressions as f64,
        })
        .collect()
}
