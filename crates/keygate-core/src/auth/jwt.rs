//! Unverified JWT payload inspection.
//!
//! The provider signs its tokens; keygate only needs the claims (expiry,
//! username), so payloads are decoded without signature verification.
//! Tokens are never logged or displayed in full.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(i64::MAX)
}

/// Decodes the payload segment of a JWT into a JSON value.
pub fn decode_payload(token: &str) -> Option<serde_json::Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let decoded = URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Returns true if the token's `exp` claim is in the past.
///
/// A token that cannot be decoded, or that carries no `exp` claim, counts
/// as expired.
pub fn is_expired(token: &str) -> bool {
    let Some(payload) = decode_payload(token) else {
        return true;
    };
    match payload.get("exp").and_then(serde_json::Value::as_i64) {
        Some(exp) => exp < now_secs(),
        None => true,
    }
}

/// Recovers the canonical username from an identity token payload.
///
/// Prefers the provider's username claim, falling back to the subject.
pub fn username_claim(token: &str) -> Option<String> {
    let payload = decode_payload(token)?;
    payload
        .get("cognito:username")
        .or_else(|| payload.get("sub"))
        .and_then(|v| v.as_str())
        .map(std::string::ToString::to_string)
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    format!("{}...", &token[..12])
}
