//! Bearer token decoding.
//!
//! Access tokens are JWT-shaped: three dot-separated base64url segments whose
//! middle segment is a JSON claims object. Only the `exp` claim matters here;
//! signatures are the server's business and are never checked client-side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

/// Number of dot-separated segments in a well-formed token.
const TOKEN_SEGMENTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry in epoch seconds.
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Time left before expiry relative to `now`; negative once expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        Duration::seconds(self.exp - now.timestamp())
    }
}

/// Decode the claims segment of `token`.
///
/// Returns `None` for anything that isn't exactly three segments with a
/// base64url JSON payload carrying an integer `exp`.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != TOKEN_SEGMENTS {
        return None;
    }

    // Issuers differ on whether they pad the payload segment.
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether `token` is expired at `now`.
///
/// Absent, empty and malformed tokens all count as expired. A token whose
/// `exp` equals the current second is still valid.
pub fn is_expired_at(token: Option<&str>, now: DateTime<Utc>) -> bool {
    match token.filter(|t| !t.is_empty()).and_then(decode_claims) {
        Some(claims) => claims.exp < now.timestamp(),
        None => true,
    }
}

pub fn is_expired(token: Option<&str>) -> bool {
    is_expired_at(token, Utc::now())
}

/// Build an unsigned token carrying `claims`. Test fixtures only need the
/// shape, not a valid signature.
#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}

/// Token expiring `secs` seconds from now (negative for the past).
#[cfg(test)]
pub(crate) fn token_expiring_in(secs: i64) -> String {
    encode_unsigned(&serde_json::json!({
        "sub": "1",
        "exp": Utc::now().timestamp() + secs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;
    use serde_json::json;

    #[test]
    fn test_future_exp_is_not_expired() {
        let token = token_expiring_in(3600);
        assert!(!is_expired(Some(&token)));
    }

    #[test]
    fn test_past_exp_is_expired() {
        let token = token_expiring_in(-60);
        assert!(is_expired(Some(&token)));
    }

    #[test]
    fn test_exp_equal_to_now_is_not_expired() {
        let now = Utc::now();
        let token = encode_unsigned(&json!({ "exp": now.timestamp() }));
        assert!(!is_expired_at(Some(&token), now));
        assert!(is_expired_at(Some(&token), now + Duration::seconds(1)));
    }

    #[test]
    fn test_absent_or_empty_is_expired() {
        assert!(is_expired(None));
        assert!(is_expired(Some("")));
    }

    #[test]
    fn test_malformed_tokens_are_expired() {
        let good_payload = URL_SAFE_NO_PAD.encode(json!({ "exp": i64::MAX / 2 }).to_string());

        // Segment count
        assert!(is_expired(Some("onlyone")));
        assert!(is_expired(Some(&format!("a.{}", good_payload))));
        assert!(is_expired(Some(&format!("a.{}.c.d", good_payload))));

        // Not base64
        assert!(is_expired(Some("a.!!!not-base64!!!.c")));

        // Not JSON
        let garbage = URL_SAFE_NO_PAD.encode("not json");
        assert!(is_expired(Some(&format!("a.{}.c", garbage))));

        // Missing or non-integer exp
        let no_exp = URL_SAFE_NO_PAD.encode(json!({ "sub": "1" }).to_string());
        assert!(is_expired(Some(&format!("a.{}.c", no_exp))));
        let string_exp = URL_SAFE_NO_PAD.encode(json!({ "exp": "tomorrow" }).to_string());
        assert!(is_expired(Some(&format!("a.{}.c", string_exp))));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let exp = Utc::now().timestamp() + 600;
        let payload = URL_SAFE.encode(json!({ "exp": exp, "sub": "42" }).to_string());
        let token = format!("h.{}.s", payload);

        let claims = decode_claims(&token).expect("padded payload should decode");
        assert_eq!(claims.exp, exp);
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert!(!is_expired(Some(&token)));
    }

    #[test]
    fn test_time_until_expiry() {
        let now = Utc::now();
        let token = encode_unsigned(&json!({ "exp": now.timestamp() + 90 }));
        let claims = decode_claims(&token).unwrap();

        assert_eq!(claims.time_until_expiry(now).num_seconds(), 90);
        assert_eq!(claims.expires_at().unwrap().timestamp(), now.timestamp() + 90);
    }
}
