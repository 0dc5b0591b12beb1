//! HTTP-level tests for the pulse-gate router
//!
//! Covers the ingest status-code mapping and the tenant admin surface via
//! tower::ServiceExt::oneshot against the real router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use pulse_common::db::init_database;
use pulse_common::events::EventBus;
use pulse_common::signing;
use pulse_gate::config::GateConfig;
use pulse_gate::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = init_database(&dir.path().join("pulse.db")).await.unwrap();
    let state = AppState::new(db, EventBus::new(100), GateConfig::default());
    (state, dir)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn signed_envelope(event_id: &str, idempotency_key: &str, secret: &str, sent_offset: Duration) -> Value {
    let payload = json!({
        "entity_id": "dealer-7",
        "channel": "search",
        "timestamp": Utc::now().to_rfc3339(),
        "impressions": 500,
        "clicks": 40,
        "conversions": 4,
        "revenue": 450.0
    });
    json!({
        "event_id": event_id,
        "event_type": "pulse.signal",
        "tenant_id": "tenant-1",
        "sent_at": (Utc::now() + sent_offset).to_rfc3339(),
        "idempotency_key": idempotency_key,
        "signature": signing::sign_payload(&payload, secret),
        "payload": payload,
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let (state, _dir) = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "pulse-gate");
}

#[tokio::test]
async fn test_ingest_status_code_mapping() {
    let (state, _dir) = test_state().await;
    let app = build_router(state);

    // Provision a tenant through the admin API
    let response = app
        .clone()
        .oneshot(post_json("/api/tenants", &json!({"tenant_id": "tenant-1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let secret = body_json(response).await["signing_secret"]
        .as_str()
        .unwrap()
        .to_string();

    // accepted -> 200 with status accepted
    let envelope = signed_envelope("evt-1", "idem-1", &secret, Duration::zero());
    let response = app
        .clone()
        .oneshot(post_json("/api/events", &envelope))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["event_id"], "evt-1");

    // duplicate -> still 200, distinguishable by body
    let response = app
        .clone()
        .oneshot(post_json("/api/events", &envelope))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "duplicate");

    // stale -> 409
    let stale = signed_envelope("evt-2", "idem-2", &secret, Duration::minutes(-10));
    let response = app
        .clone()
        .oneshot(post_json("/api/events", &stale))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["status"], "stale");

    // invalid signature -> 401
    let mut forged = signed_envelope("evt-3", "idem-3", &secret, Duration::zero());
    forged["signature"] = json!("0".repeat(64));
    let response = app
        .clone()
        .oneshot(post_json("/api/events", &forged))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["status"], "invalid_signature");

    // malformed payload -> 400
    let mut malformed = signed_envelope("evt-4", "idem-4", &secret, Duration::zero());
    malformed["payload"]["impressions"] = json!("many");
    malformed["signature"] = json!(signing::sign_payload(&malformed["payload"], &secret));
    let response = app
        .oneshot(post_json("/api/events", &malformed))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], "bad_request");
}

#[tokio::test]
async fn test_duplicate_tenant_creation_conflicts() {
    let (state, _dir) = test_state().await;
    let app = build_router(state);

    let request = json!({"tenant_id": "tenant-1"});
    let response = app
        .clone()
        .oneshot(post_json("/api/tenants", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json("/api/tenants", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rotate_unknown_tenant_is_404() {
    let (state, _dir) = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json("/api/tenants/nobody/rotate", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
