//! pulse-gate library - Envelope Guard module
//!
//! Accept-or-reject gate for inbound signed trust-signal envelopes.
//! Exposes public APIs for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod guard;

pub use crate::error::{ApiError, ApiResult};

use crate::config::GateConfig;
use crate::guard::seen::SeenCache;
use axum::Router;
use pulse_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Process-local duplicate fast-path filter (store remains authoritative)
    pub seen_cache: Arc<SeenCache>,
    /// Guard tunables loaded from the settings table
    pub config: GateConfig,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: GateConfig) -> Self {
        let seen_cache = Arc::new(SeenCache::new(
            config.seen_cache_capacity,
            config.freshness_window,
        ));
        Self {
            db,
            event_bus,
            seen_cache,
            config,
        }
    }
}

/// Spawn the periodic seen-key expiry sweep
///
/// The duplicate filter only needs to cover the freshness window; this
/// keeps the table bounded without touching the hot ingest path.
pub fn spawn_background_tasks(state: &AppState) {
    let db = state.db.clone();
    let interval = std::time::Duration::from_secs(
        state.config.freshness_window.num_seconds().max(1) as u64,
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match guard::seen::sweep_expired(&db).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed = removed, "Expired seen-keys swept")
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Seen-key sweep error: {}", e),
            }
        }
    });
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;

    Router::new()
        .route("/api/events", post(api::ingest_envelope))
        .route("/api/tenants", post(api::create_tenant))
        .route("/api/tenants/:tenant_id/rotate", post(api::rotate_tenant))
        .route("/api/tenants/:tenant_id/promote", post(api::promote_tenant))
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
