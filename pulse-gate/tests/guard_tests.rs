//! Envelope Guard integration tests
//!
//! Exercises the full verification pipeline against a real SQLite store:
//! idempotency, freshness symmetry, signature rotation, and the no-side-
//! effects-on-rejection rule.

use chrono::{DateTime, Duration, Utc};
use pulse_common::db::{init_database, tenants};
use pulse_common::envelope::{AckStatus, Envelope};
use pulse_common::events::EventBus;
use pulse_common::signing;
use pulse_gate::config::GateConfig;
use pulse_gate::guard::{verify_envelope, Verdict};
use pulse_gate::AppState;
use serde_json::json;
use tempfile::TempDir;

struct TestHarness {
    state: AppState,
    secret: String,
    // Held for the lifetime of the test so the database file survives
    _dir: TempDir,
}

async fn harness() -> TestHarness {
    let dir = TempDir::new().unwrap();
    let db = init_database(&dir.path().join("pulse.db")).await.unwrap();
    let secret = tenants::create_tenant(&db, "tenant-1").await.unwrap();
    let state = AppState::new(db, EventBus::new(100), GateConfig::default());
    TestHarness {
        state,
        secret,
        _dir: dir,
    }
}

fn signal_payload() -> serde_json::Value {
    json!({
        "entity_id": "dealer-7",
        "channel": "search",
        "timestamp": Utc::now().to_rfc3339(),
        "impressions": 1000,
        "clicks": 80,
        "conversions": 6,
        "revenue": 900.0
    })
}

fn envelope_with(
    event_id: &str,
    idempotency_key: &str,
    sent_at: DateTime<Utc>,
    payload: serde_json::Value,
    secret: &str,
) -> Envelope {
    Envelope {
        event_id: event_id.to_string(),
        event_type: "pulse.signal".to_string(),
        tenant_id: "tenant-1".to_string(),
        sent_at,
        idempotency_key: idempotency_key.to_string(),
        signature: signing::sign_payload(&payload, secret),
        payload,
    }
}

async fn stored_event_count(state: &AppState) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM events")
        .fetch_one(&state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_same_envelope_twice_accepted_then_duplicate() {
    let h = harness().await;
    let envelope = envelope_with("evt-1", "idem-1", Utc::now(), signal_payload(), &h.secret);

    let first = verify_envelope(&h.state, &envelope).await.unwrap();
    assert!(matches!(first, Verdict::Accepted { .. }));

    let second = verify_envelope(&h.state, &envelope).await.unwrap();
    assert_eq!(second.status(), AckStatus::Duplicate);

    // Store state identical to a single submission
    assert_eq!(stored_event_count(&h.state).await, 1);
}

#[tokio::test]
async fn test_reused_idempotency_key_is_duplicate() {
    let h = harness().await;
    let first = envelope_with("evt-1", "idem-shared", Utc::now(), signal_payload(), &h.secret);
    let second = envelope_with("evt-2", "idem-shared", Utc::now(), signal_payload(), &h.secret);

    assert_eq!(
        verify_envelope(&h.state, &first).await.unwrap().status(),
        AckStatus::Accepted
    );
    assert_eq!(
        verify_envelope(&h.state, &second).await.unwrap().status(),
        AckStatus::Duplicate
    );
    assert_eq!(stored_event_count(&h.state).await, 1);
}

#[tokio::test]
async fn test_freshness_window_is_symmetric() {
    let h = harness().await;

    // Window is 5 minutes: 10 minutes past AND 10 minutes future both stale
    let past = envelope_with(
        "evt-past",
        "idem-past",
        Utc::now() - Duration::minutes(10),
        signal_payload(),
        &h.secret,
    );
    let future = envelope_with(
        "evt-future",
        "idem-future",
        Utc::now() + Duration::minutes(10),
        signal_payload(),
        &h.secret,
    );

    assert_eq!(
        verify_envelope(&h.state, &past).await.unwrap().status(),
        AckStatus::Stale
    );
    assert_eq!(
        verify_envelope(&h.state, &future).await.unwrap().status(),
        AckStatus::Stale
    );
    assert_eq!(stored_event_count(&h.state).await, 0);
}

#[tokio::test]
async fn test_stale_rejection_does_not_mark_keys_seen() {
    let h = harness().await;

    // First attempt from a skewed clock is rejected as stale
    let stale = envelope_with(
        "evt-retry",
        "idem-retry",
        Utc::now() - Duration::minutes(30),
        signal_payload(),
        &h.secret,
    );
    assert_eq!(
        verify_envelope(&h.state, &stale).await.unwrap().status(),
        AckStatus::Stale
    );

    // The legitimate retry after clock correction must be accepted, not
    // treated as a duplicate of the rejected attempt
    let retry = envelope_with("evt-retry", "idem-retry", Utc::now(), signal_payload(), &h.secret);
    assert_eq!(
        verify_envelope(&h.state, &retry).await.unwrap().status(),
        AckStatus::Accepted
    );
}

#[tokio::test]
async fn test_bad_signature_rejected_without_side_effects() {
    let h = harness().await;

    let mut envelope = envelope_with("evt-sig", "idem-sig", Utc::now(), signal_payload(), &h.secret);
    envelope.signature = "0".repeat(64);

    assert_eq!(
        verify_envelope(&h.state, &envelope).await.unwrap().status(),
        AckStatus::InvalidSignature
    );
    assert_eq!(stored_event_count(&h.state).await, 0);

    // A correctly signed retry with the same ids goes through
    let signed = envelope_with("evt-sig", "idem-sig", Utc::now(), signal_payload(), &h.secret);
    assert_eq!(
        verify_envelope(&h.state, &signed).await.unwrap().status(),
        AckStatus::Accepted
    );
}

#[tokio::test]
async fn test_unknown_tenant_rejected_as_invalid_signature() {
    let h = harness().await;
    let mut envelope = envelope_with("evt-x", "idem-x", Utc::now(), signal_payload(), &h.secret);
    envelope.tenant_id = "tenant-unknown".to_string();

    assert_eq!(
        verify_envelope(&h.state, &envelope).await.unwrap().status(),
        AckStatus::InvalidSignature
    );
}

#[tokio::test]
async fn test_signature_rotation_grace_period() {
    let h = harness().await;

    // Stage a next secret; both generations must verify during the grace
    let next = tenants::rotate_tenant_secret(&h.state.db, "tenant-1")
        .await
        .unwrap();

    let with_current = envelope_with("evt-cur", "idem-cur", Utc::now(), signal_payload(), &h.secret);
    assert_eq!(
        verify_envelope(&h.state, &with_current).await.unwrap().status(),
        AckStatus::Accepted
    );

    let with_next = envelope_with("evt-next", "idem-next", Utc::now(), signal_payload(), &next);
    assert_eq!(
        verify_envelope(&h.state, &with_next).await.unwrap().status(),
        AckStatus::Accepted
    );

    // A signature made with neither secret is rejected
    let with_neither = envelope_with(
        "evt-neither",
        "idem-neither",
        Utc::now(),
        signal_payload(),
        "not-a-real-secret",
    );
    assert_eq!(
        verify_envelope(&h.state, &with_neither).await.unwrap().status(),
        AckStatus::InvalidSignature
    );
}

#[tokio::test]
async fn test_promote_ends_grace_for_old_secret() {
    let h = harness().await;
    let next = tenants::rotate_tenant_secret(&h.state.db, "tenant-1")
        .await
        .unwrap();
    tenants::promote_tenant_secret(&h.state.db, "tenant-1")
        .await
        .unwrap();

    // Promoted secret is now current
    let with_promoted = envelope_with("evt-p", "idem-p", Utc::now(), signal_payload(), &next);
    assert_eq!(
        verify_envelope(&h.state, &with_promoted).await.unwrap().status(),
        AckStatus::Accepted
    );

    // The retired secret no longer verifies
    let with_retired = envelope_with("evt-r", "idem-r", Utc::now(), signal_payload(), &h.secret);
    assert_eq!(
        verify_envelope(&h.state, &with_retired).await.unwrap().status(),
        AckStatus::InvalidSignature
    );
}

#[tokio::test]
async fn test_malformed_payload_rejected_before_side_effects() {
    let h = harness().await;

    // impressions as a string fails the pulse.signal schema
    let payload = json!({
        "entity_id": "dealer-7",
        "channel": "search",
        "timestamp": Utc::now().to_rfc3339(),
        "impressions": "many",
        "clicks": 80,
        "conversions": 6,
        "revenue": 900.0
    });
    let envelope = envelope_with("evt-bad", "idem-bad", Utc::now(), payload, &h.secret);
    assert_eq!(
        verify_envelope(&h.state, &envelope).await.unwrap().status(),
        AckStatus::BadRequest
    );

    // Unknown event type takes the same path
    let mut unknown = envelope_with("evt-bad", "idem-bad", Utc::now(), signal_payload(), &h.secret);
    unknown.event_type = "pulse.mystery".to_string();
    assert_eq!(
        verify_envelope(&h.state, &unknown).await.unwrap().status(),
        AckStatus::BadRequest
    );

    // Neither attempt marked anything seen
    let ok = envelope_with("evt-bad", "idem-bad", Utc::now(), signal_payload(), &h.secret);
    assert_eq!(
        verify_envelope(&h.state, &ok).await.unwrap().status(),
        AckStatus::Accepted
    );
}

#[tokio::test]
async fn test_seen_key_sweep_removes_only_expired_rows() {
    let h = harness().await;

    let envelope = envelope_with("evt-1", "idem-1", Utc::now(), signal_payload(), &h.secret);
    verify_envelope(&h.state, &envelope).await.unwrap();

    // An aged-out key from a long-dead window
    sqlx::query("INSERT INTO seen_keys (key, tenant_id, expires_at) VALUES ('evt:old', 'tenant-1', ?)")
        .bind(Utc::now() - Duration::hours(1))
        .execute(&h.state.db)
        .await
        .unwrap();

    let removed = pulse_gate::guard::seen::sweep_expired(&h.state.db).await.unwrap();
    assert_eq!(removed, 1);

    // The live keys from the accepted envelope survive
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seen_keys")
        .fetch_one(&h.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 2);
}

#[tokio::test]
async fn test_accepted_event_lands_in_store_with_entity() {
    let h = harness().await;
    let envelope = envelope_with("evt-1", "idem-1", Utc::now(), signal_payload(), &h.secret);
    verify_envelope(&h.state, &envelope).await.unwrap();

    let entity: Option<(String,)> =
        sqlx::query_as("SELECT tenant_id FROM entities WHERE entity_id = 'dealer-7'")
            .fetch_optional(&h.state.db)
            .await
            .unwrap();
    assert_eq!(entity.unwrap().0, "tenant-1");
}
