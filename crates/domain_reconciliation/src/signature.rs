//! Webhook signature verification
//!
//! The gateway signs `"{timestamp}.{raw body}"` with HMAC-SHA256 using the
//! shared webhook secret and sends `t=<unix seconds>,v1=<hex digest>` in the
//! signature header. Several `v1` entries may be present during secret
//! rotation; any match is accepted.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::ReconciliationError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "gateway-signature";

/// Default accepted clock skew between signing and receipt
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Checks `header` against `payload`; nothing may be processed unless
    /// this returns `Ok`
    pub fn verify(&self, payload: &[u8], header: &str, now: DateTime<Utc>) -> Result<(), ReconciliationError> {
        let parsed = ParsedHeader::parse(header)?;

        let skew = (now.timestamp() - parsed.timestamp).unsigned_abs();
        if skew > self.tolerance_secs {
            warn!(skew, tolerance = self.tolerance_secs, "Webhook timestamp outside tolerance");
            return Err(ReconciliationError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        let expected = self.digest(parsed.timestamp, payload)?;
        let matched = parsed
            .signatures
            .iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));

        if matched {
            Ok(())
        } else {
            warn!("Webhook signature mismatch");
            Err(ReconciliationError::InvalidSignature("signature mismatch".to_string()))
        }
    }

    /// Builds a header value for `payload` signed at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, ReconciliationError> {
        let digest = self.digest(timestamp, payload)?;
        Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
    }

    fn digest(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, ReconciliationError> {
        if self.secret.is_empty() {
            return Err(ReconciliationError::InvalidSignature(
                "webhook secret is not configured".to_string(),
            ));
        }
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ReconciliationError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

struct ParsedHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

impl<'a> ParsedHeader<'a> {
    fn parse(header: &'a str) -> Result<Self, ReconciliationError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self { timestamp, signatures }),
            _ => Err(ReconciliationError::InvalidSignature("malformed signature header".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_signed_payload_verifies() {
        let verifier = WebhookVerifier::new("whsec_test", DEFAULT_TOLERANCE_SECS);
        let header = verifier.sign(BODY, now().timestamp()).unwrap();

        assert!(verifier.verify(BODY, &header, now()).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let verifier = WebhookVerifier::new("whsec_test", DEFAULT_TOLERANCE_SECS);
        let header = verifier.sign(BODY, now().timestamp()).unwrap();

        let result = verifier.verify(br#"{"id":"evt_2"}"#, &header, now());
        assert!(matches!(result, Err(ReconciliationError::InvalidSignature(_))));
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let signer = WebhookVerifier::new("whsec_other", DEFAULT_TOLERANCE_SECS);
        let verifier = WebhookVerifier::new("whsec_test", DEFAULT_TOLERANCE_SECS);
        let header = signer.sign(BODY, now().timestamp()).unwrap();

        assert!(verifier.verify(BODY, &header, now()).is_err());
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let verifier = WebhookVerifier::new("whsec_test", 300);
        let header = verifier.sign(BODY, now().timestamp() - 301).unwrap();

        assert!(verifier.verify(BODY, &header, now()).is_err());
    }

    #[test]
    fn test_any_rotated_signature_matches() {
        let verifier = WebhookVerifier::new("whsec_test", DEFAULT_TOLERANCE_SECS);
        let signed = verifier.sign(BODY, now().timestamp()).unwrap();
        let valid = signed.split_once("v1=").unwrap().1;
        let header = format!("t={},v1=deadbeef,v1={}", now().timestamp(), valid);

        assert!(verifier.verify(BODY, &header, now()).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        let verifier = WebhookVerifier::new("whsec_test", DEFAULT_TOLERANCE_SECS);

        for header in ["", "v1=abc", "t=abc,v1=abc", "t=1740830400"] {
            assert!(verifier.verify(BODY, header, now()).is_err(), "{header}");
        }
    }

    #[test]
    fn test_empty_secret_never_verifies() {
        let verifier = WebhookVerifier::new("", DEFAULT_TOLERANCE_SECS);
        assert!(verifier.sign(BODY, now().timestamp()).is_err());
    }
}
