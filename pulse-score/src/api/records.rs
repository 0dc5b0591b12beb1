//! Bucket and notification read endpoints
//!
//! Read-only surfaces over the recompute outputs, consumed by the external
//! UI/notification layer.

use axum::{
    extract::{Path, State},
    Json,
};
use pulse_common::db::models::{BucketRow, NotificationRecord};
use pulse_common::time;

use crate::{ApiError, AppState};

/// GET /api/buckets/:entity_id
pub async fn get_entity_buckets(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<Vec<BucketRow>>, ApiError> {
    let rows: Vec<BucketRow> = sqlx::query_as(
        "SELECT * FROM buckets WHERE entity_id = ? ORDER BY bucket_key",
    )
    .bind(&entity_id)
    .fetch_all(&state.db)
    .await
    .map_err(pulse_common::Error::from)?;

    Ok(Json(rows))
}

/// GET /api/notifications/:entity_id
///
/// Only unexpired records are served; expiry is enforced on read as well as
/// by the periodic sweep.
pub async fn get_entity_notifications(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    let rows: Vec<NotificationRecord> = sqlx::query_as(
        "SELECT * FROM notifications WHERE entity_id = ? AND expires_at > ? \
         ORDER BY created_at DESC",
    )
    .bind(&entity_id)
    .bind(time::now())
    .fetch_all(&state.db)
    .await
    .map_err(pulse_common::Error::from)?;

    Ok(Json(rows))
}
