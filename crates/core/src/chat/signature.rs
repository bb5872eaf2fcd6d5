//! Inbound request signature verification (Slack signing secret, `v0`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Requests older (or newer) than this are rejected as replays.
pub const MAX_SIGNATURE_AGE_SECS: u64 = 60 * 5;

const VERSION: &str = "v0";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Request timestamp outside the allowed window")]
    Expired,

    #[error("Malformed signature")]
    Malformed,

    #[error("Signature mismatch")]
    Mismatch,
}

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}

/// The signature header value for a request.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let digest = mac(secret, timestamp, body).finalize().into_bytes();
    format!("{}={}", VERSION, hex::encode(digest))
}

/// Check a request signature against the signing secret.
///
/// `now` is the current unix time in seconds.
pub fn verify_signature(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let sent_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;
    if now.abs_diff(sent_at) > MAX_SIGNATURE_AGE_SECS {
        return Err(SignatureError::Expired);
    }

    let digest = signature
        .strip_prefix("v0=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or(SignatureError::Malformed)?;

    mac(secret, timestamp, body)
        .verify_slice(&digest)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&command=%2Fdiffusion&text=x2+a+red+fox";

    #[test]
    fn test_valid_signature() {
        let signature = sign(SECRET, "1531420618", BODY);
        assert!(signature.starts_with("v0="));
        assert_eq!(
            verify_signature(SECRET, "1531420618", BODY, &signature, 1531420618 + 10),
            Ok(())
        );
    }

    #[test]
    fn test_known_vector() {
        // Example request from the Slack signing documentation.
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let expected = "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";
        assert_eq!(sign(SECRET, "1531420618", body), expected);
        assert!(verify_signature(SECRET, "1531420618", body, expected, 1531420618).is_ok());
    }

    #[test]
    fn test_tampered_body() {
        let signature = sign(SECRET, "1531420618", BODY);
        let result = verify_signature(SECRET, "1531420618", b"text=other", &signature, 1531420618);
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_wrong_secret() {
        let signature = sign("other-secret", "1531420618", BODY);
        let result = verify_signature(SECRET, "1531420618", BODY, &signature, 1531420618);
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_expired_timestamp() {
        let signature = sign(SECRET, "1531420618", BODY);
        let now = 1531420618 + MAX_SIGNATURE_AGE_SECS as i64 + 1;
        let result = verify_signature(SECRET, "1531420618", BODY, &signature, now);
        assert_eq!(result, Err(SignatureError::Expired));
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            verify_signature(SECRET, "yesterday", BODY, "v0=00", 0),
            Err(SignatureError::InvalidTimestamp(_))
        ));
        assert_eq!(
            verify_signature(SECRET, "100", BODY, "v1=abcd", 100),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, "100", BODY, "v0=not-hex", 100),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        let now = 1_700_000_000;
        for timestamp in [i64::MIN.to_string(), i64::MAX.to_string()] {
            assert_eq!(
                verify_signature(SECRET, &timestamp, BODY, "v0=00", now),
                Err(SignatureError::Expired)
            );
        }
    }
}
