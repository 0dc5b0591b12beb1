//! Sweep trigger endpoint
//!
//! The cron/trigger layer calls this nightly (day granularity) or monthly.
//! Racing or retried triggers are safe: per-key job dedupe absorbs them.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::aggregate::Granularity;
use crate::scheduler;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SweepRequest {
    /// "day" | "week" | "month"
    pub granularity: String,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub enqueued: usize,
    pub deduped: usize,
    pub job_ids: Vec<String>,
}

/// POST /api/sweep
pub async fn trigger_sweep(
    State(state): State<AppState>,
    Json(request): Json<SweepRequest>,
) -> Result<Json<SweepResponse>, ApiError> {
    let granularity = Granularity::parse(&request.granularity).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown granularity: {}", request.granularity))
    })?;

    let outcomes = scheduler::enqueue_sweep(&state, granularity).await?;
    let deduped = outcomes.iter().filter(|o| o.deduped).count();

    Ok(Json(SweepResponse {
        enqueued: outcomes.len() - deduped,
        deduped,
        job_ids: outcomes.into_iter().map(|o| o.job_id).collect(),
    }))
}
