//! pulse-score library - Aggregation, scoring and recompute scheduling
//!
//! Exposes public APIs for integration testing.

pub mod aggregate;
pub mod alert;
pub mod api;
pub mod config;
pub mod error;
pub mod notifier;
pub mod scheduler;
pub mod scoring;

pub use crate::error::{ApiError, ApiResult};

use crate::alert::Alerter;
use crate::config::ScoreConfig;
use axum::Router;
use pulse_common::events::EventBus;
use sqlx::SqlitePool;

/// Application state shared across HTTP handlers and scheduler tasks
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Scoring/scheduler tunables loaded from the settings table
    pub config: ScoreConfig,
    /// Outbound alert channel for job failures
    pub alerter: Alerter,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: ScoreConfig) -> Self {
        let alerter = Alerter::new(config.alert_webhook_url.clone());
        Self {
            db,
            event_bus,
            config,
            alerter,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;

    Router::new()
        .route("/api/jobs", post(api::enqueue_job))
        .route("/api/jobs/:job_id", get(api::get_job_status))
        .route("/api/sweep", post(api::trigger_sweep))
        .route("/api/scores/:entity_id", get(api::get_latest_scores))
        .route("/api/buckets/:entity_id", get(api::get_entity_buckets))
        .route("/api/notifications/:entity_id", get(api::get_entity_notifications))
        .route("/api/scoring/reward", post(api::evaluate_reward))
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Spawn the scheduler and retry-sweep background loops
pub fn spawn_background_tasks(state: &AppState) {
    tokio::spawn(scheduler::run_scheduler_loop(state.clone()));
    tokio::spawn(scheduler::run_retry_sweep_loop(state.clone()));
}
