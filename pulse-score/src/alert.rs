//! Outbound alerting for job failures
//!
//! Posts JSON to a configured webhook so the external alerting channel can
//! triage without replaying event history. Disabled when no URL is set;
//! send failures are logged and never propagate into job handling.

use pulse_common::db::models::JobRecord;
use serde_json::json;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Alerter {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Alerter {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Report a job failure (may still be retried by the sweep)
    pub async fn job_failed(&self, job: &JobRecord, error: &str) {
        self.post(json!({
            "alert": "job_failed",
            "job_id": job.job_id,
            "entity_id": job.entity_id,
            "period": job.period,
            "attempts": job.attempts,
            "error": error,
        }))
        .await;
    }

    /// Report a job that exhausted its retry budget
    pub async fn job_dead_lettered(&self, job: &JobRecord) {
        self.post(json!({
            "alert": "job_dead_lettered",
            "job_id": job.job_id,
            "entity_id": job.entity_id,
            "period": job.period,
            "attempts": job.attempts,
            "error": job.last_error,
        }))
        .await;
    }

    async fn post(&self, payload: serde_json::Value) {
        let Some(url) = &self.webhook_url else {
            debug!("Alert webhook not configured, dropping alert");
            return;
        };

        if let Err(e) = self.client.post(url).json(&payload).send().await {
            warn!("Failed to deliver alert webhook: {}", e);
        }
    }
}
