//! Score record lookup endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use pulse_common::db::models::ScoreRecord;

use crate::{ApiError, AppState};

/// GET /api/scores/:entity_id
///
/// Returns the latest ScoreRecord per metric for the entity. History stays
/// in the table; this surface only serves the superseding row of each.
pub async fn get_latest_scores(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<Vec<ScoreRecord>>, ApiError> {
    let records: Vec<ScoreRecord> = sqlx::query_as(
        "SELECT sr.* FROM score_records sr \
         JOIN (SELECT entity_id, metric_name, MAX(computed_at) AS computed_at \
               FROM score_records WHERE entity_id = ? \
               GROUP BY entity_id, metric_name) latest \
         ON sr.entity_id = latest.entity_id \
         AND sr.metric_name = latest.metric_name \
         AND sr.computed_at = latest.computed_at \
         ORDER BY sr.metric_name",
    )
    .bind(&entity_id)
    .fetch_all(&state.db)
    .await
    .map_err(pulse_common::Error::from)?;

    Ok(Json(records))
}
