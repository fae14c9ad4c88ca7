//! Expiry-claim extraction from opaque bearer credentials.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

/// Extract the expiration timestamp from a dot-delimited bearer token.
///
/// A credential is only inspected when it looks like
/// `header.payload.signature` with a base64url JSON payload carrying a
/// numeric `exp` in seconds since the epoch. Anything else yields `None`,
/// which callers treat as "no known expiration". The signature is never
/// verified here; this is cache bookkeeping, not authentication.
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let payload = decode_segment(segments[1])?;
    let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

/// Decode one base64url segment. Issuers are supposed to emit unpadded
/// segments, but padded ones show up in the wild; tolerate both.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()
}


#[cfg(test)]
mod tests {
    use super::test_tokens::{token_expiring_at, token_with_claims};
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_numeric_exp() {
        let exp = Utc.with_ymd_and_hms(2030, 1, 15, 12, 0, 0).unwrap();
        let token = token_expiring_at(exp);
        assert_eq!(decode_expiry(&token), Some(exp));
    }

    #[test]
    fn tolerates_padded_segments() {
        use base64::engine::general_purpose::URL_SAFE;
        let header = URL_SAFE.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE.encode(br#"{"exp":1893456000,"n":"x"}"#);
        assert!(payload.ends_with('='));
        let token = format!("{header}.{payload}.sig");
        let decoded = decode_expiry(&token).unwrap();
        assert_eq!(decoded.timestamp(), 1_893_456_000);
    }

    #[test]
    fn opaque_token_has_no_expiry() {
        assert_eq!(decode_expiry("not-a-jwt"), None);
        assert_eq!(decode_expiry(""), None);
    }

    #[test]
    fn wrong_segment_count_has_no_expiry() {
        assert_eq!(decode_expiry("a.b"), None);
        assert_eq!(decode_expiry("a.b.c.d"), None);
    }

    #[test]
    fn garbage_payload_has_no_expiry() {
        assert_eq!(decode_expiry("aGVhZGVy.!!!not-base64!!!.sig"), None);
    }

    #[test]
    fn non_json_payload_has_no_expiry() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"plain text");
        assert_eq!(decode_expiry(&format!("h.{payload}.s")), None);
    }

    #[test]
    fn missing_or_non_numeric_exp_has_no_expiry() {
        let no_exp = token_with_claims(&serde_json::json!({ "sub": "user" }));
        assert_eq!(decode_expiry(&no_exp), None);

        let string_exp = token_with_claims(&serde_json::json!({ "exp": "tomorrow" }));
        assert_eq!(decode_expiry(&string_exp), None);
    }
}
