//! Clock and token expiry decoding. Tokens are opaque apart from the `exp`
//! claim; signatures are never checked here, the API does that.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use time::OffsetDateTime;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub trait TokenDecoder: Send + Sync {
    /// Expiry instant of `token`, or `None` when it cannot be decoded.
    fn decode_expiry(&self, token: &str) -> Option<OffsetDateTime>;

    /// Undecodable tokens count as already expired.
    fn is_expired(&self, token: &str, now: OffsetDateTime) -> bool {
        self.decode_expiry(token).map_or(true, |expires_at| expires_at <= now)
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Reads the `exp` claim (unix seconds) from a JWT payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct JwtExpiryDecoder;

impl TokenDecoder for JwtExpiryDecoder {
    fn decode_expiry(&self, token: &str) -> Option<OffsetDateTime> {
        let payload = token.split('.').nth(1)?;
        let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('=')).ok()?;
        let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
        OffsetDateTime::from_unix_timestamp(claim.exp?).ok()
    }
}

#[cfg(test)]
pub(crate) fn jwt_with_exp(exp: i64) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = Base64UrlUnpadded::encode_string(format!(r#"{{"sub":"1","exp":{exp}}}"#).as_bytes());
    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(NOW).expect("valid timestamp")
    }

    #[test]
    fn decodes_exp_claim() {
        let token = jwt_with_exp(NOW + 60);
        let expires_at = JwtExpiryDecoder.decode_expiry(&token).expect("decodable");
        assert_eq!(expires_at.unix_timestamp(), NOW + 60);
        assert!(!JwtExpiryDecoder.is_expired(&token, now()));
    }

    #[test]
    fn expiry_instant_itself_counts_as_expired() {
        let token = jwt_with_exp(NOW);
        assert!(JwtExpiryDecoder.is_expired(&token, now()));
    }

    #[test]
    fn undecodable_tokens_are_expired() {
        for token in ["", "opaque", "a.!!!.c", "a.e30.c"] {
            assert!(JwtExpiryDecoder.decode_expiry(token).is_none(), "{token}");
            assert!(JwtExpiryDecoder.is_expired(token, now()), "{token}");
        }
    }
}
