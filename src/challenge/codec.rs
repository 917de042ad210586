//! Signed challenge tokens exchanged with the verification service.
//!
//! Wire form: `<prefix>:<payload>|<expiry>|<signature>`
//!
//! - `prefix`: `TX` for a challenge we issue, `AUTH` for the service's answer
//! - `payload`: base64 of `username:integration_key`
//! - `expiry`: unix timestamp in seconds
//! - `signature`: hex HMAC-SHA256 of `prefix|payload|expiry` keyed by the application key
//!
//! The prefix is covered by the signature, so a `TX` token can't be relabelled as `AUTH`,
//! and a genuine `TX` token handed back as a response is caught by the direction check.

use crate::challenge::error::{ChallengeError, VerificationError};
use crate::config::{DuoKeys, DEFAULT_CHALLENGE_TTL_SECS};
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::{fmt, time::Duration};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const REQUEST_PREFIX: &str = "TX";
pub const RESPONSE_PREFIX: &str = "AUTH";

/// Anything longer is rejected before any parsing or hashing.
pub const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Request => REQUEST_PREFIX,
            Self::Response => RESPONSE_PREFIX,
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            REQUEST_PREFIX => Some(Self::Request),
            RESPONSE_PREFIX => Some(Self::Response),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeToken(String);

impl ChallengeToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChallengeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChallengeToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Keys plus the user a token is (or should be) bound to.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeRequest<'a> {
    pub keys: &'a DuoKeys,
    pub username: &'a str,
}

impl<'a> ChallengeRequest<'a> {
    #[must_use]
    pub const fn new(keys: &'a DuoKeys, username: &'a str) -> Self {
        Self { keys, username }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeCodec {
    ttl: Duration,
}

impl Default for ChallengeCodec {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECS))
    }
}

impl ChallengeCodec {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build the outbound `TX` token, valid for the codec ttl from `now`.
    ///
    /// # Errors
    /// Returns an error if the username is empty or signing fails.
    pub fn build_request(
        &self,
        req: &ChallengeRequest<'_>,
        now: i64,
    ) -> Result<ChallengeToken, ChallengeError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.sign(Direction::Request, req, now.saturating_add(ttl))
    }

    /// Sign a token in either direction with an explicit expiry.
    ///
    /// # Errors
    /// Returns an error if the username is empty or signing fails.
    pub fn sign(
        &self,
        direction: Direction,
        req: &ChallengeRequest<'_>,
        expiry: i64,
    ) -> Result<ChallengeToken, ChallengeError> {
        if req.username.is_empty() {
            return Err(ChallengeError::EmptyUsername);
        }

        let prefix = direction.prefix();
        let payload = Base64::encode_string(
            format!("{}:{}", req.username, req.keys.integration_key()).as_bytes(),
        );
        let signature = signature(req.keys.application_key(), prefix, &payload, expiry)
            .ok_or(ChallengeError::Signing)?;

        Ok(ChallengeToken(format!(
            "{prefix}:{payload}|{expiry}|{}",
            hex::encode(signature)
        )))
    }

    /// Validate a response token and return the username it vouches for.
    ///
    /// Checks run in a fixed order and stop at the first failure: shape, signature,
    /// expiry, identity, direction.
    ///
    /// # Errors
    /// Returns the [`VerificationError`] of the first failed check.
    pub fn extract_and_verify(
        &self,
        response: &str,
        req: &ChallengeRequest<'_>,
        now: i64,
    ) -> Result<String, VerificationError> {
        let token = ParsedToken::parse(response)?;

        let expected = signature(
            req.keys.application_key(),
            token.prefix,
            token.payload,
            token.expiry,
        )
        .ok_or(VerificationError::InvalidSignature)?;

        if expected.len() != token.signature.len()
            || !bool::from(expected.as_slice().ct_eq(&token.signature))
        {
            return Err(VerificationError::InvalidSignature);
        }

        if token.expiry <= now {
            return Err(VerificationError::Expired);
        }

        let (username, integration_key) = decode_payload(token.payload)?;
        if integration_key != req.keys.integration_key() || username != req.username {
            return Err(VerificationError::IdentityMismatch);
        }

        if Direction::from_prefix(token.prefix) != Some(Direction::Response) {
            return Err(VerificationError::WrongTokenDirection);
        }

        Ok(username)
    }
}

struct ParsedToken<'a> {
    prefix: &'a str,
    payload: &'a str,
    expiry: i64,
    signature: Vec<u8>,
}

impl<'a> ParsedToken<'a> {
    fn parse(raw: &'a str) -> Result<Self, VerificationError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_TOKEN_LEN {
            return Err(VerificationError::MalformedToken);
        }

        let (prefix, body) = raw
            .split_once(':')
            .ok_or(VerificationError::MalformedToken)?;

        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(VerificationError::MalformedToken);
        }

        let mut parts = body.split('|');
        let (Some(payload), Some(expiry), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VerificationError::MalformedToken);
        };

        if payload.is_empty() || expiry.is_empty() || !expiry.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(VerificationError::MalformedToken);
        }

        let expiry = expiry
            .parse::<i64>()
            .map_err(|_| VerificationError::MalformedToken)?;
        let signature = hex::decode(signature).map_err(|_| VerificationError::MalformedToken)?;

        Ok(Self {
            prefix,
            payload,
            expiry,
            signature,
        })
    }
}

fn decode_payload(payload: &str) -> Result<(String, String), VerificationError> {
    let bytes = Base64::decode_vec(payload).map_err(|_| VerificationError::MalformedToken)?;
    let text = String::from_utf8(bytes).map_err(|_| VerificationError::MalformedToken)?;

    // integration keys are alphanumeric, the username may contain ':'
    let (username, integration_key) = text
        .rsplit_once(':')
        .ok_or(VerificationError::MalformedToken)?;

    Ok((username.to_string(), integration_key.to_string()))
}

fn signature(key: &SecretString, prefix: &str, payload: &str, expiry: i64) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes()).ok()?;
    mac.update(format!("{prefix}|{payload}|{expiry}").as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{keys, AKEY, SKEY};

    const NOW: i64 = 1_700_000_000;

    fn codec() -> ChallengeCodec {
        ChallengeCodec::default()
    }

    fn response(keys: &DuoKeys, username: &str, expiry: i64) -> String {
        codec()
            .sign(Direction::Response, &ChallengeRequest::new(keys, username), expiry)
            .unwrap()
            .into_string()
    }

    /// Replace the character at `index` with a different base64 character.
    fn flip(token: &str, index: usize) -> String {
        let mut bytes = token.as_bytes().to_vec();
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_request_shape() {
        let keys = keys();
        let token = codec()
            .build_request(&ChallengeRequest::new(&keys, "alice"), NOW)
            .unwrap();

        let (prefix, body) = token.as_str().split_once(':').unwrap();
        assert_eq!(prefix, REQUEST_PREFIX);

        let parts: Vec<&str> = body.split('|').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(
            Base64::decode_vec(parts[0]).unwrap(),
            format!("alice:{}", keys.integration_key()).into_bytes()
        );
        assert_eq!(parts[1], (NOW + 300).to_string());
        assert_eq!(parts[2].len(), 64);
        assert!(parts[2].bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_never_contains_secrets() {
        let keys = keys();
        let token = codec()
            .build_request(&ChallengeRequest::new(&keys, "alice"), NOW)
            .unwrap();
        assert!(!token.as_str().contains(AKEY));
        assert!(!token.as_str().contains(SKEY));
    }

    #[test]
    fn test_valid_response() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let raw = response(&keys, "alice", NOW + 300);
        assert_eq!(codec().extract_and_verify(&raw, &req, NOW), Ok("alice".to_string()));
    }

    #[test]
    fn test_username_with_colon() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "corp:alice");
        let raw = response(&keys, "corp:alice", NOW + 300);
        assert_eq!(
            codec().extract_and_verify(&raw, &req, NOW),
            Ok("corp:alice".to_string())
        );
    }

    #[test]
    fn test_empty_username() {
        let keys = keys();
        assert_eq!(
            codec().build_request(&ChallengeRequest::new(&keys, ""), NOW),
            Err(ChallengeError::EmptyUsername)
        );
    }

    #[test]
    fn test_expired_after_ttl() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let issued = codec().build_request(&req, NOW).unwrap();
        let expiry = NOW + 300;
        assert!(issued.as_str().contains(&format!("|{expiry}|")));

        let raw = response(&keys, "alice", expiry);
        assert_eq!(codec().extract_and_verify(&raw, &req, NOW + 299), Ok("alice".to_string()));
        assert_eq!(
            codec().extract_and_verify(&raw, &req, NOW + 300),
            Err(VerificationError::Expired)
        );
        assert_eq!(
            codec().extract_and_verify(&raw, &req, NOW + 301),
            Err(VerificationError::Expired)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let raw = response(&keys, "alice", NOW + 300);
        // first payload character follows "AUTH:"
        let tampered = flip(&raw, RESPONSE_PREFIX.len() + 1);
        assert_ne!(tampered, raw);
        assert_eq!(
            codec().extract_and_verify(&tampered, &req, NOW),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_expiry_and_signature() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let raw = response(&keys, "alice", NOW + 300);

        let extended = raw.replace(&format!("|{}|", NOW + 300), &format!("|{}|", NOW + 9000));
        assert_eq!(
            codec().extract_and_verify(&extended, &req, NOW),
            Err(VerificationError::InvalidSignature)
        );

        let (head, sig) = raw.rsplit_once('|').unwrap();
        let other = if sig.starts_with('0') { "1" } else { "0" };
        let forged = format!("{head}|{other}{}", &sig[1..]);
        assert_eq!(
            codec().extract_and_verify(&forged, &req, NOW),
            Err(VerificationError::InvalidSignature)
        );

        let truncated = format!("{head}|{}", &sig[..32]);
        assert_eq!(
            codec().extract_and_verify(&truncated, &req, NOW),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[test]
    fn test_other_application_key() {
        let keys = keys();
        let other = DuoKeys::new(
            keys.integration_key(),
            SecretString::from(SKEY.to_string()),
            SecretString::from("z".repeat(40)),
        )
        .unwrap();
        let raw = response(&other, "alice", NOW + 300);
        assert_eq!(
            codec().extract_and_verify(&raw, &ChallengeRequest::new(&keys, "alice"), NOW),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[test]
    fn test_identity_mismatch() {
        let keys = keys();
        let raw = response(&keys, "mallory", NOW + 300);
        assert_eq!(
            codec().extract_and_verify(&raw, &ChallengeRequest::new(&keys, "alice"), NOW),
            Err(VerificationError::IdentityMismatch)
        );

        // same application key, different integration
        let other = DuoKeys::new(
            "DIYYYYYYYYYYYYYYYYYY",
            SecretString::from(SKEY.to_string()),
            SecretString::from(AKEY.to_string()),
        )
        .unwrap();
        let raw = response(&other, "alice", NOW + 300);
        assert_eq!(
            codec().extract_and_verify(&raw, &ChallengeRequest::new(&keys, "alice"), NOW),
            Err(VerificationError::IdentityMismatch)
        );
    }

    #[test]
    fn test_request_token_replayed_as_response() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let issued = codec().build_request(&req, NOW).unwrap();
        assert_eq!(
            codec().extract_and_verify(issued.as_str(), &req, NOW),
            Err(VerificationError::WrongTokenDirection)
        );

        // relabelling breaks the signature instead
        let relabelled = issued.as_str().replacen(REQUEST_PREFIX, RESPONSE_PREFIX, 1);
        assert_eq!(
            codec().extract_and_verify(&relabelled, &req, NOW),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[test]
    fn test_unknown_prefix_is_wrong_direction() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let payload = Base64::encode_string(format!("alice:{}", keys.integration_key()).as_bytes());
        let expiry = NOW + 300;
        let sig = signature(keys.application_key(), "APP", &payload, expiry).unwrap();
        let raw = format!("APP:{payload}|{expiry}|{}", hex::encode(sig));
        assert_eq!(
            codec().extract_and_verify(&raw, &req, NOW),
            Err(VerificationError::WrongTokenDirection)
        );
    }

    #[test]
    fn test_check_order() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");

        // expired and forged: signature is checked first
        let raw = response(&keys, "alice", NOW - 10);
        let forged = flip(&raw, RESPONSE_PREFIX.len() + 1);
        assert_eq!(
            codec().extract_and_verify(&forged, &req, NOW),
            Err(VerificationError::InvalidSignature)
        );

        // expired request token: expiry before direction
        let issued = codec().build_request(&req, NOW - 1000).unwrap();
        assert_eq!(
            codec().extract_and_verify(issued.as_str(), &req, NOW),
            Err(VerificationError::Expired)
        );

        // other user's request token: identity before direction
        let issued = codec()
            .build_request(&ChallengeRequest::new(&keys, "mallory"), NOW)
            .unwrap();
        assert_eq!(
            codec().extract_and_verify(issued.as_str(), &req, NOW),
            Err(VerificationError::IdentityMismatch)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let valid = response(&keys, "alice", NOW + 300);
        let body = valid.split_once(':').unwrap().1.to_string();

        let cases = vec![
            String::new(),
            "   ".to_string(),
            "garbage".to_string(),
            body.clone(),
            format!("auth:{body}"),
            format!(":{body}"),
            format!("AUTH:{body}|extra"),
            "AUTH:abc|123".to_string(),
            "AUTH:|123|00".to_string(),
            "AUTH:abc||00".to_string(),
            "AUTH:abc|-5|00".to_string(),
            "AUTH:abc|12x|00".to_string(),
            "AUTH:abc|123|zz".to_string(),
            "AUTH:abc|99999999999999999999999|00".to_string(),
            format!("AUTH:{}|1|00", "A".repeat(MAX_TOKEN_LEN)),
        ];

        for raw in cases {
            assert_eq!(
                codec().extract_and_verify(&raw, &req, NOW),
                Err(VerificationError::MalformedToken),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_signed_garbage_payload_is_malformed() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let expiry = NOW + 300;
        let payload = "!!notbase64!!";
        let sig = signature(keys.application_key(), RESPONSE_PREFIX, payload, expiry).unwrap();
        let raw = format!("AUTH:{payload}|{expiry}|{}", hex::encode(sig));
        assert_eq!(
            codec().extract_and_verify(&raw, &req, NOW),
            Err(VerificationError::MalformedToken)
        );
    }

    #[test]
    fn test_surrounding_whitespace() {
        let keys = keys();
        let req = ChallengeRequest::new(&keys, "alice");
        let raw = format!("  {}\n", response(&keys, "alice", NOW + 300));
        assert!(codec().extract_and_verify(&raw, &req, NOW).is_ok());
    }
}
