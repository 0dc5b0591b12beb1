//! Envelope freshness validation
//!
//! Freshness is a symmetric window around receipt time: envelopes too far in
//! the past AND too far in the future are both stale. One-sided checks let a
//! producer with a fast clock replay far-future timestamps, so the window
//! cuts both ways.

use chrono::{DateTime, Duration, Utc};

/// Check that `sent_at` lies within ±`window` of `now`
pub fn is_fresh(sent_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    let skew = if now >= sent_at {
        now - sent_at
    } else {
        sent_at - now
    };
    skew <= window
}
