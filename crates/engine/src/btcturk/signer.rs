//! Request signing for the BTCTurk private API.
//!
//! `X-Signature` is base64(HMAC-SHA256(secret, api_key || stamp)) where the
//! stamp is milliseconds since the epoch as a decimal string.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use common::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Stamp and signature for one request. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedStamp {
    pub timestamp: String,
    pub signature: String,
}

pub fn sign(api_key: &str, api_secret: &str, now: DateTime<Utc>) -> Result<SignedStamp> {
    let timestamp = now.timestamp_millis().to_string();
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|e| Error::Config(format!("invalid API secret: {e}")))?;
    mac.update(api_key.as_bytes());
    mac.update(timestamp.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(SignedStamp {
        timestamp,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn matches_reference_signatures() {
        let stamp = sign("key", "secret", at(1_700_000_000_000)).unwrap();
        assert_eq!(stamp.timestamp, "1700000000000");
        assert_eq!(stamp.signature, "DrFe0Jwm1Rtlw95KLCGUUPWDWSSyZuL+NLsCSbK+Iwk=");

        let stamp = sign("my-api-key", "my-api-secret", at(1_700_000_000_123)).unwrap();
        assert_eq!(stamp.timestamp, "1700000000123");
        assert_eq!(stamp.signature, "5zHRE2RbIlNUOdn8Al6BjZ/8bd/YGojI9z2KV6+YgEM=");
    }

    #[test]
    fn stamp_changes_signature() {
        let a = sign("key", "secret", at(1_700_000_000_000)).unwrap();
        let b = sign("key", "secret", at(1_700_000_000_001)).unwrap();
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn secret_never_appears_in_output() {
        let stamp = sign("key", "super-secret-value", at(1_700_000_000_000)).unwrap();
        let rendered = format!("{stamp:?}");
        assert!(!rendered.contains("super-secret-value"));
    }
}
