// Access token expiry checks
// Reads the `exp` claim from a JWT payload without verifying the signature

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Default margin before the real expiry at which a token stops being usable
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 60;

/// Expiry time embedded in the token, if it can be decoded
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = decode_segment(payload)?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let millis = claims.get("exp")?.as_f64()? * 1000.0;
    // out-of-range claims read as undecodable, so the token counts as expired
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// True when the token expires before `now + skew`, or cannot be decoded at all
pub fn is_expired_at(token: &str, now: DateTime<Utc>, skew: Duration) -> bool {
    match expires_at(token) {
        Some(exp) => exp < now + skew,
        None => true,
    }
}

/// [`is_expired_at`] against the current time
pub fn is_expired(token: &str, skew: Duration) -> bool {
    is_expired_at(token, Utc::now(), skew)
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()
}
