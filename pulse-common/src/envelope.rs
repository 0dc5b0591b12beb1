//! Envelope wire types and payload decoding
//!
//! The envelope is the unit of inbound trust: a signed, timestamped wrapper
//! around one producer event. Payloads decode into a tagged sum type over the
//! known event kinds; unknown or malformed shapes are rejected before any
//! business logic runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signed event envelope, one per inbound event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque globally-unique event id
    pub event_id: String,
    /// Declared payload kind, e.g. "pulse.signal"
    pub event_type: String,
    pub tenant_id: String,
    /// Producer-side send time (freshness window applies)
    pub sent_at: DateTime<Utc>,
    /// Caller-supplied at-most-one-effect token
    pub idempotency_key: String,
    /// Hex-encoded HMAC-SHA256 over the canonical payload bytes
    pub signature: String,
    pub payload: serde_json::Value,
}

/// Raw per-channel counter sample carried by a `pulse.signal` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub entity_id: String,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: f64,
}

/// Review counters carried by a `pulse.review` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSample {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub rating: f64,
    pub review_count: i64,
    pub negative_count: i64,
}

/// Citation / answer-surface counters carried by a `pulse.citation` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationSample {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub citations: i64,
    pub ai_presence_rate: f64,
    pub gbp_impressions: i64,
    pub gbp_actions: i64,
}

/// Decoded envelope payload, tagged by the envelope's `event_type`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Signal(MetricSample),
    Review(ReviewSample),
    Citation(CitationSample),
}

impl EventPayload {
    /// Decode a payload against the declared event type's schema
    ///
    /// Unknown event types and shape mismatches both return `None`; the
    /// caller maps that to a `bad_request` rejection.
    pub fn decode(event_type: &str, payload: &serde_json::Value) -> Option<EventPayload> {
        match event_type {
            "pulse.signal" => serde_json::from_value(payload.clone())
                .ok()
                .map(EventPayload::Signal),
            "pulse.review" => serde_json::from_value(payload.clone())
                .ok()
                .map(EventPayload::Review),
            "pulse.citation" => serde_json::from_value(payload.clone())
                .ok()
                .map(EventPayload::Citation),
            _ => None,
        }
    }

    /// Entity the payload scores against
    pub fn entity_id(&self) -> &str {
        match self {
            EventPayload::Signal(s) => &s.entity_id,
            EventPayload::Review(r) => &r.entity_id,
            EventPayload::Citation(c) => &c.entity_id,
        }
    }

    /// Producer-side observation time
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            EventPayload::Signal(s) => s.timestamp,
            EventPayload::Review(r) => r.timestamp,
            EventPayload::Citation(c) => c.timestamp,
        }
    }
}

/// Ingest acknowledgment status
///
/// `Accepted` and `Duplicate` are both success-shaped: a duplicate is the
/// intended outcome of at-least-once delivery, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Accepted,
    Duplicate,
    Stale,
    InvalidSignature,
    BadRequest,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Accepted => "accepted",
            AckStatus::Duplicate => "duplicate",
            AckStatus::Stale => "stale",
            AckStatus::InvalidSignature => "invalid_signature",
            AckStatus::BadRequest => "bad_request",
        }
    }
}

/// Ingest acknowledgment returned for every envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub event_id: String,
    pub status: AckStatus,
}
