//! Configuration resolution for pulse-gate

use chrono::Duration;
use pulse_common::db::settings::get_i64_setting;
use pulse_common::Result;
use sqlx::SqlitePool;

/// Guard tunables, loaded once at startup from the settings table
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Symmetric freshness window around receipt time
    pub freshness_window: Duration,
    /// Capacity bound for the process-local seen-key cache
    pub seen_cache_capacity: usize,
}

impl GateConfig {
    /// Load from the settings table, falling back to defaults
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let window_secs = get_i64_setting(pool, "gate_freshness_window_secs", 300).await?;
        let capacity = get_i64_setting(pool, "gate_seen_cache_capacity", 4096).await?;

        Ok(Self {
            freshness_window: Duration::seconds(window_secs.max(1)),
            seen_cache_capacity: capacity.max(1) as usize,
        })
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::seconds(300),
            seen_cache_capacity: 4096,
        }
    }
}
