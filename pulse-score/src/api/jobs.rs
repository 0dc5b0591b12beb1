//! Job enqueue and status endpoints
//!
//! Enqueueing an (entity, period) that already has a non-terminal job is a
//! no-op reporting the existing job id; `deduped` in the response tells the
//! two cases apart.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Granularity, Period};
use crate::scheduler;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub entity_id: String,
    /// "day" | "week" | "month"
    pub granularity: String,
    /// Bucket key, e.g. "2026-03-02" or "2026-02"
    pub period: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
    pub deduped: bool,
}

/// POST /api/jobs
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    if request.entity_id.trim().is_empty() {
        return Err(ApiError::BadRequest("entity_id must not be empty".to_string()));
    }
    let granularity = Granularity::parse(&request.granularity).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown granularity: {}", request.granularity))
    })?;
    if Period::from_key(granularity, &request.period).is_none() {
        return Err(ApiError::BadRequest(format!(
            "Invalid {} period key: {}",
            granularity.as_str(),
            request.period
        )));
    }

    let outcome = scheduler::enqueue_job(
        &state.db,
        scheduler::job_type_for_granularity(granularity),
        &request.entity_id,
        &request.period,
    )
    .await?;

    Ok(Json(EnqueueResponse {
        job_id: outcome.job_id,
        deduped: outcome.deduped,
    }))
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub entity_id: String,
    pub period: String,
    pub status: String,
    pub attempts: i64,
    pub dead_lettered: bool,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// GET /api/jobs/:job_id
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = scheduler::get_job_by_id(&state.db, &job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        entity_id: job.entity_id,
        period: job.period,
        status: job.status,
        attempts: job.attempts,
        dead_lettered: job.dead_lettered,
        last_error: job.last_error,
        enqueued_at: job.enqueued_at,
        finished_at: job.finished_at,
    }))
}
