//! Envelope ingest endpoint
//!
//! One POST per envelope. Status mapping: `accepted` and `duplicate` are
//! both 200 (a duplicate is the normal outcome of at-least-once delivery,
//! distinguishable by the body), `bad_request` 400, `invalid_signature`
//! 401, `stale` 409. Callers must not alert on duplicates.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use pulse_common::envelope::{Ack, AckStatus, Envelope};

use crate::guard;
use crate::{ApiError, AppState};

/// POST /api/events
pub async fn ingest_envelope(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> Result<impl IntoResponse, ApiError> {
    let verdict = guard::verify_envelope(&state, &envelope).await?;
    let status = verdict.status();

    let http_status = match status {
        AckStatus::Accepted | AckStatus::Duplicate => StatusCode::OK,
        AckStatus::BadRequest => StatusCode::BAD_REQUEST,
        AckStatus::InvalidSignature => StatusCode::UNAUTHORIZED,
        AckStatus::Stale => StatusCode::CONFLICT,
    };

    let ack = Ack {
        event_id: envelope.event_id,
        status,
    };
    Ok((http_status, Json(ack)))
}
