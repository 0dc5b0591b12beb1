//! Envelope payload signing
//!
//! Producers sign the canonical JSON serialization of the `payload` object
//! with HMAC-SHA256 keyed by their tenant signing secret, hex-encoded.
//! The gate recomputes the MAC over the same canonical bytes and compares.
//!
//! Canonical JSON: object keys sorted alphabetically, no whitespace. This
//! makes the signed bytes independent of producer-side key ordering.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Convert JSON to canonical form (sorted keys, no whitespace)
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("\"{}\":{}", k, to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Compute the hex-encoded HMAC-SHA256 of raw bytes under a tenant secret
pub fn compute_signature(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    let bytes = mac.finalize().into_bytes();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Compute the signature over a JSON payload's canonical serialization
pub fn sign_payload(payload: &Value, secret: &str) -> String {
    compute_signature(to_canonical_json(payload).as_bytes(), secret)
}

/// Check a hex-encoded signature against the payload and one secret
pub fn signature_matches(provided: &str, payload: &Value, secret: &str) -> bool {
    let calculated = sign_payload(payload, secret);
    provided.eq_ignore_ascii_case(&calculated)
}
