//! SSE event stream endpoint

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Streams job transitions, computed scores and notifications to the
/// external UI/notification layer.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    pulse_common::sse::event_bus_sse_stream(&state.event_bus, "pulse-score")
}
