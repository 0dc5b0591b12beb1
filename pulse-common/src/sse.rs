//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementations for the MarketPulse microservices.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};

/// Create an SSE stream that forwards EventBus events to one client
///
/// Sends an initial connection status event, then forwards every bus event
/// as a `PulseEvent` SSE message. Heartbeat comments keep idle connections
/// alive. Lagged subscribers skip dropped events and keep streaming.
pub fn event_bus_sse_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match tokio::time::timeout(Duration::from_secs(15), rx.recv()).await {
                Ok(Ok(event)) => {
                    if let Ok(sse_event) = Event::default().event("PulseEvent").json_data(&event) {
                        yield Ok(sse_event);
                    }
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!("SSE: {} subscriber lagged, skipped {} events", service_name, skipped);
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                    info!("SSE: {} event stream closed", service_name);
                    break;
                }
                Err(_) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
