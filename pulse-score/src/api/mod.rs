//! HTTP API handlers for pulse-score

mod health;
mod jobs;
mod records;
mod reward;
mod scores;
mod sse;
mod sweep;

pub use health::{health_check, health_routes};
pub use jobs::{enqueue_job, get_job_status};
pub use records::{get_entity_buckets, get_entity_notifications};
pub use reward::evaluate_reward;
pub use scores::get_latest_scores;
pub use sse::event_stream;
pub use sweep::trigger_sweep;
