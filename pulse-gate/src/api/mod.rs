//! HTTP API handlers for pulse-gate

mod health;
mod ingest;
mod sse;
mod tenants;

pub use health::{health_check, health_routes};
pub use ingest::ingest_envelope;
pub use sse::event_stream;
pub use tenants::{create_tenant, promote_tenant, rotate_tenant};
