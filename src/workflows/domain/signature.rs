//! Webhook signature verification.
//!
//! The header has the form `t=<unix_seconds>,v0=<hex_digest>`. The digest is
//! HMAC-SHA256 over `"<timestamp>.<raw_body>"` keyed with the shared secret.
//! Timestamps older than the tolerance are rejected; timestamps in the
//! future are accepted to absorb clock skew.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a signature is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The header is not `t=<ts>,v0=<hex>`.
    #[error("malformed signature header")]
    MalformedHeader,
    /// The digest is not valid hexadecimal.
    #[error("signature digest is not hexadecimal")]
    InvalidHex,
    /// The signing secret is unusable.
    #[error("webhook secret is not configured")]
    MissingSecret,
    /// The timestamp is older than the tolerance.
    #[error("signature timestamp is {age_secs}s old, tolerance is {tolerance_secs}s")]
    Stale {
        /// Age of the timestamp.
        age_secs: i64,
        /// Accepted age.
        tolerance_secs: u64,
    },
    /// The digest does not match the body.
    #[error("signature does not match body")]
    Mismatch,
}

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signing time in Unix seconds.
    pub timestamp: i64,
    /// Raw digest bytes.
    pub digest: Vec<u8>,
}

impl SignatureHeader {
    /// Parses a header value.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedHeader`] when either part is
    /// missing or the timestamp is not an integer, and
    /// [`SignatureError::InvalidHex`] for a non-hex digest.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut digest = None;
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| SignatureError::MalformedHeader)?,
                    );
                }
                Some(("v0", value)) => digest = Some(decode_digest(value)?),
                _ => {}
            }
        }
        match (timestamp, digest) {
            (Some(ts), Some(bytes)) => Ok(Self {
                timestamp: ts,
                digest: bytes,
            }),
            _ => Err(SignatureError::MalformedHeader),
        }
    }
}

/// Verifies a webhook signature against the raw body.
///
/// # Errors
///
/// Returns the [`SignatureError`] describing why the signature was rejected.
pub fn verify_signature(
    secret: &str,
    header: &str,
    raw_body: &str,
    now: DateTime<Utc>,
    tolerance_secs: u64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }
    let parsed = SignatureHeader::parse(header)?;
    let age_secs = now.timestamp().saturating_sub(parsed.timestamp);
    if age_secs > i64::try_from(tolerance_secs).unwrap_or(i64::MAX) {
        return Err(SignatureError::Stale {
            age_secs,
            tolerance_secs,
        });
    }
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::MissingSecret)?;
    mac.update(signed_payload(parsed.timestamp, raw_body).as_bytes());
    mac.verify_slice(&parsed.digest)
        .map_err(|_| SignatureError::Mismatch)
}

/// Produces a header value for `raw_body`, as the provider would.
#[must_use]
pub fn sign(secret: &str, timestamp: i64, raw_body: &str) -> String {
    let digest = HmacSha256::new_from_slice(secret.as_bytes()).map_or_else(
        |_| String::new(),
        |mut mac| {
            mac.update(signed_payload(timestamp, raw_body).as_bytes());
            hex::encode(mac.finalize().into_bytes())
        },
    );
    format!("t={timestamp},v0={digest}")
}

fn signed_payload(timestamp: i64, raw_body: &str) -> String {
    format!("{timestamp}.{raw_body}")
}

fn decode_digest(text: &str) -> Result<Vec<u8>, SignatureError> {
    let digest = hex::decode(text.trim())?;
    if digest.is_empty() {
        return Err(SignatureError::InvalidHex);
    }
    Ok(digest)
}

impl From<hex::FromHexError> for SignatureError {
    fn from(_: hex::FromHexError) -> Self {
        Self::InvalidHex
    }
}

#[cfg(test)]
mod tests {
    use super::{SignatureError, SignatureHeader, sign, verify_signature};
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::{fixture, rstest};

    const SECRET: &str = "whsec_test";
    const BODY: &str = r#"{"data":{"request_id":"req-1"}}"#;

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    fn valid_signature_is_accepted(now: DateTime<Utc>) {
        let header = sign(SECRET, now.timestamp() - 60, BODY);

        assert_eq!(verify_signature(SECRET, &header, BODY, now, 1800), Ok(()));
    }

    #[rstest]
    fn tampered_body_is_rejected(now: DateTime<Utc>) {
        let header = sign(SECRET, now.timestamp(), BODY);

        let result = verify_signature(SECRET, &header, r#"{"data":{}}"#, now, 1800);

        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[rstest]
    fn wrong_secret_is_rejected(now: DateTime<Utc>) {
        let header = sign("someone-else", now.timestamp(), BODY);

        assert_eq!(
            verify_signature(SECRET, &header, BODY, now, 1800),
            Err(SignatureError::Mismatch)
        );
    }

    #[rstest]
    #[case(1800, true)]
    #[case(1801, false)]
    fn stale_timestamps_are_rejected(
        now: DateTime<Utc>,
        #[case] age: i64,
        #[case] accepted: bool,
    ) {
        let header = sign(SECRET, now.timestamp() - age, BODY);

        let result = verify_signature(SECRET, &header, BODY, now, 1800);

        assert_eq!(result.is_ok(), accepted);
    }

    #[rstest]
    fn future_timestamps_are_accepted(now: DateTime<Utc>) {
        let header = sign(SECRET, now.timestamp() + 3600, BODY);

        assert_eq!(verify_signature(SECRET, &header, BODY, now, 1800), Ok(()));
    }

    #[rstest]
    #[case("v0=abcd")]
    #[case("t=1700000000")]
    #[case("t=soon,v0=abcd")]
    #[case("")]
    fn malformed_headers_are_rejected(#[case] header: &str) {
        assert_eq!(
            SignatureHeader::parse(header),
            Err(SignatureError::MalformedHeader)
        );
    }

    #[rstest]
    #[case("t=1700000000,v0=xyz1")]
    #[case("t=1700000000,v0=abc")]
    #[case("t=1700000000,v0=")]
    fn non_hex_digests_are_rejected(#[case] header: &str) {
        assert_eq!(
            SignatureHeader::parse(header),
            Err(SignatureError::InvalidHex)
        );
    }

    #[rstest]
    fn digests_are_lowercase_hex_and_uppercase_is_accepted(now: DateTime<Utc>) {
        let header = sign(SECRET, now.timestamp(), BODY);
        let (prefix, digest) = header.split_once(",v0=").expect("digest part");
        let shouted = format!("{prefix},v0={}", digest.to_uppercase());

        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(verify_signature(SECRET, &shouted, BODY, now, 1800), Ok(()));
    }

    #[rstest]
    fn header_parts_may_appear_in_any_order() {
        let parsed = SignatureHeader::parse("v0=0aFF, t=1700000000").expect("valid header");

        assert_eq!(parsed.timestamp, 1_700_000_000);
        assert_eq!(parsed.digest, vec![0x0a, 0xff]);
    }

    #[rstest]
    fn missing_secret_is_reported(now: DateTime<Utc>) {
        let header = sign(SECRET, now.timestamp(), BODY);

        assert_eq!(
            verify_signature("", &header, BODY, now, 1800),
            Err(SignatureError::MissingSecret)
        );
    }
}
