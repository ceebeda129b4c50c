//! Compact token payload helpers
//!
//! These helpers read claims without verifying signatures. The wrapped OIDC
//! client validates tokens; the store only needs `exp` to hide stale tokens.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde_json::{Map, Value};

/// Decode the payload segment of a compact token
///
/// Any malformed input (missing segment, bad base64, non-UTF-8 bytes, JSON
/// that is not an object) yields an empty map.
#[must_use]
pub fn decode_token_payload(token: &str) -> Map<String, Value> {
    let Some(payload_b64) = token.split('.').nth(1) else {
        return Map::new();
    };

    let Some(payload_bytes) = decode_segment(payload_b64) else {
        return Map::new();
    };

    match serde_json::from_slice::<Value>(&payload_bytes) {
        Ok(Value::Object(claims)) => claims,
        _ => Map::new(),
    }
}

// Issuers disagree on padding and alphabet, so try the url-safe forms first
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| general_purpose::URL_SAFE.decode(segment))
        .or_else(|_| general_purpose::STANDARD.decode(segment))
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(segment))
        .ok()
}

/// Expiry of a token in milliseconds since the epoch
///
/// Returns `None` for an empty token or when the payload carries no usable
/// `exp` claim. Numeric strings are accepted. An `exp` of zero counts as absent.
#[must_use]
pub fn token_exp(token: &str) -> Option<i64> {
    if token.is_empty() {
        return None;
    }

    let claims = decode_token_payload(token);
    let exp = match claims.get("exp")? {
        Value::String(exp) => exp.trim().parse::<f64>().ok()?,
        exp => exp.as_f64()?,
    };
    if exp == 0.0 || !exp.is_finite() {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    Some((exp * 1000.0) as i64)
}

/// Whether a token's `exp` lies in the past
///
/// Tokens without an expiry are treated as non-expiring.
#[must_use]
pub fn token_is_expired(token: &str) -> bool {
    token_is_expired_at(token, Utc::now().timestamp_millis())
}

/// Same as [`token_is_expired`] against an explicit clock in milliseconds
#[must_use]
pub fn token_is_expired_at(token: &str, now_millis: i64) -> bool {
    token_exp(token).is_some_and(|expiry| expiry < now_millis)
}

/// Expiry helper for optional token fields held by the store
#[must_use]
pub fn optional_token_exp(token: Option<&str>) -> Option<i64> {
    token.and_then(token_exp)
}
