//! Envelope Guard - accept-or-reject each inbound envelope exactly once
//!
//! Verification stages, in order: payload shape, freshness, signature,
//! duplicate. The only mutation (recording seen-keys and appending the
//! event) happens on the accept path; a rejection for staleness or a bad
//! signature leaves no trace, so a legitimate retry after clock correction
//! is not wrongly treated as a duplicate.

pub mod freshness;
pub mod seen;

use crate::AppState;
use chrono::Duration;
use pulse_common::db::tenants::get_tenant_secrets;
use pulse_common::envelope::{AckStatus, Envelope, EventPayload};
use pulse_common::events::PulseEvent;
use pulse_common::{signing, time, Result};
use tracing::{debug, info, warn};

/// Outcome of envelope verification
#[derive(Debug)]
pub enum Verdict {
    /// Envelope passed all checks and was appended to the event store
    Accepted { payload: EventPayload },
    /// Envelope was rejected with a machine-readable reason
    Rejected { status: AckStatus },
}

impl Verdict {
    pub fn status(&self) -> AckStatus {
        match self {
            Verdict::Accepted { .. } => AckStatus::Accepted,
            Verdict::Rejected { status } => *status,
        }
    }
}

/// Verify one envelope and, if it passes, persist it
///
/// Stage order matters: the shape check runs first so malformed payloads
/// never reach the signature/duplicate stages' side effects, and the
/// duplicate check runs last so only accept-bound envelopes mark keys seen.
pub async fn verify_envelope(state: &AppState, envelope: &Envelope) -> Result<Verdict> {
    // Shape: payload must decode against the declared event_type
    let payload = match EventPayload::decode(&envelope.event_type, &envelope.payload) {
        Some(payload) => payload,
        None => {
            debug!(
                event_id = %envelope.event_id,
                event_type = %envelope.event_type,
                "Rejecting envelope: unknown type or malformed payload"
            );
            return Ok(reject(state, envelope, AckStatus::BadRequest));
        }
    };

    // Freshness: symmetric skew window around receipt time
    let now = time::now();
    if !freshness::is_fresh(envelope.sent_at, now, state.config.freshness_window) {
        warn!(
            event_id = %envelope.event_id,
            tenant_id = %envelope.tenant_id,
            sent_at = %envelope.sent_at,
            "Rejecting envelope: outside freshness window"
        );
        return Ok(reject(state, envelope, AckStatus::Stale));
    }

    // Signature: current secret first, then the staged next secret so key
    // rotation does not drop in-flight traffic
    let secrets = match get_tenant_secrets(&state.db, &envelope.tenant_id).await? {
        Some(secrets) => secrets,
        None => {
            warn!(
                event_id = %envelope.event_id,
                tenant_id = %envelope.tenant_id,
                "Rejecting envelope: unknown tenant"
            );
            return Ok(reject(state, envelope, AckStatus::InvalidSignature));
        }
    };

    let signed = signing::signature_matches(&envelope.signature, &envelope.payload, &secrets.current)
        || secrets
            .next
            .as_deref()
            .map(|next| signing::signature_matches(&envelope.signature, &envelope.payload, next))
            .unwrap_or(false);

    if !signed {
        warn!(
            event_id = %envelope.event_id,
            tenant_id = %envelope.tenant_id,
            "Rejecting envelope: signature mismatch"
        );
        return Ok(reject(state, envelope, AckStatus::InvalidSignature));
    }

    // Duplicate fast path: process-local cache in front of the store
    let event_key = format!("evt:{}:{}", envelope.tenant_id, envelope.event_id);
    let idem_key = format!("idem:{}:{}", envelope.tenant_id, envelope.idempotency_key);
    if state.seen_cache.contains(&event_key) || state.seen_cache.contains(&idem_key) {
        debug!(event_id = %envelope.event_id, "Duplicate envelope (cache hit), no-op");
        return Ok(reject(state, envelope, AckStatus::Duplicate));
    }

    // Duplicate authoritative check + event append, atomically. If either
    // key is already recorded the transaction rolls back, leaving the other
    // key unmarked.
    let retention = seen_retention(state.config.freshness_window);
    let expires_at = now + retention;
    let mut tx = state.db.begin().await?;

    let event_id_fresh = seen::try_mark_seen(&mut tx, &event_key, &envelope.tenant_id, expires_at).await?;
    let idem_fresh = seen::try_mark_seen(&mut tx, &idem_key, &envelope.tenant_id, expires_at).await?;

    if !event_id_fresh || !idem_fresh {
        tx.rollback().await?;
        debug!(event_id = %envelope.event_id, "Duplicate envelope (store hit), no-op");
        return Ok(reject(state, envelope, AckStatus::Duplicate));
    }

    // The store itself is the final duplicate arbiter: an event replayed
    // after its seen-key aged out still collides on the events primary key
    let appended = sqlx::query(
        "INSERT OR IGNORE INTO events \
         (tenant_id, event_id, event_type, idempotency_key, entity_id, sent_at, received_at, payload) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&envelope.tenant_id)
    .bind(&envelope.event_id)
    .bind(&envelope.event_type)
    .bind(&envelope.idempotency_key)
    .bind(payload.entity_id())
    .bind(envelope.sent_at)
    .bind(now)
    .bind(signing::to_canonical_json(&envelope.payload))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if appended == 0 {
        tx.rollback().await?;
        debug!(event_id = %envelope.event_id, "Duplicate envelope (event store hit), no-op");
        return Ok(reject(state, envelope, AckStatus::Duplicate));
    }

    sqlx::query("INSERT OR IGNORE INTO entities (entity_id, tenant_id) VALUES (?, ?)")
        .bind(payload.entity_id())
        .bind(&envelope.tenant_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    state.seen_cache.insert(&event_key);
    state.seen_cache.insert(&idem_key);

    info!(
        event_id = %envelope.event_id,
        tenant_id = %envelope.tenant_id,
        event_type = %envelope.event_type,
        entity_id = %payload.entity_id(),
        "Envelope accepted"
    );
    state.event_bus.emit(PulseEvent::EnvelopeAccepted {
        tenant_id: envelope.tenant_id.clone(),
        event_id: envelope.event_id.clone(),
        event_type: envelope.event_type.clone(),
        timestamp: now,
    });

    Ok(Verdict::Accepted { payload })
}

/// Seen-key retention: at least the freshness window on both sides, so any
/// envelope fresh enough to pass stage two still finds its key recorded
fn seen_retention(window: Duration) -> Duration {
    window * 2
}

fn reject(state: &AppState, envelope: &Envelope, status: AckStatus) -> Verdict {
    state.event_bus.emit(PulseEvent::EnvelopeRejected {
        tenant_id: envelope.tenant_id.clone(),
        event_id: envelope.event_id.clone(),
        reason: status.as_str().to_string(),
        timestamp: time::now(),
    });
    Verdict::Rejected { status }
}
