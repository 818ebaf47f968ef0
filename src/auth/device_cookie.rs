//! The signed "remembered device" cookie.
//!
//! Carries no server-side state: the value is the username plus an HMAC over
//! it, keyed by a sub-key of the application secret. A cookie whose signature
//! does not match its username is untrusted for bypass purposes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '|';

/// A verified device cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCookie {
    pub username: String,
    pub signature: Vec<u8>,
}

#[derive(Clone)]
pub struct DeviceCookieCodec {
    mac: HmacSha256,
}

impl DeviceCookieCodec {
    #[must_use]
    pub fn new(key: &[u8; 32]) -> Self {
        let mac =
            HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
        Self { mac }
    }

    fn sign(&self, username: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(username.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Serialize a fresh cookie for `username`.
    #[must_use]
    pub fn encode(&self, username: &str) -> String {
        format!(
            "{username}{SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(self.sign(username))
        )
    }

    /// Decode and verify a raw cookie value.
    ///
    /// Fails soft: malformed, unsigned, or mis-signed input yields `None`,
    /// never an error.
    #[must_use]
    pub fn decode(&self, raw: &str) -> Option<DeviceCookie> {
        let (username, encoded_signature) = raw.rsplit_once(SEPARATOR)?;
        if username.is_empty() {
            return None;
        }
        let signature = URL_SAFE_NO_PAD.decode(encoded_signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(username.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&signature).ok()?;
        Some(DeviceCookie {
            username: username.to_string(),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> DeviceCookieCodec {
        DeviceCookieCodec::new(&[7u8; 32])
    }

    #[test]
    fn encode_decode_round_trips() {
        let codec = codec();
        let raw = codec.encode("alice@example.com");
        let cookie = codec.decode(&raw).expect("cookie should verify");
        assert_eq!(cookie.username, "alice@example.com");
    }

    #[test]
    fn tampered_signature_does_not_verify() {
        let codec = codec();
        let raw = codec.encode("alice@example.com");
        let (username, encoded) = raw.rsplit_once('|').expect("separator present");
        let mut signature = URL_SAFE_NO_PAD.decode(encoded).expect("valid base64");
        signature[0] ^= 0x01;
        let tampered = format!("{username}|{}", URL_SAFE_NO_PAD.encode(signature));
        assert_eq!(codec.decode(&tampered), None);
    }

    #[test]
    fn swapped_username_does_not_verify() {
        let codec = codec();
        let raw = codec.encode("alice@example.com");
        let (_, encoded) = raw.rsplit_once('|').expect("separator present");
        let forged = format!("mallory@example.com|{encoded}");
        assert_eq!(codec.decode(&forged), None);
    }

    #[test]
    fn malformed_input_fails_soft() {
        let codec = codec();
        assert_eq!(codec.decode(""), None);
        assert_eq!(codec.decode("no-separator"), None);
        assert_eq!(codec.decode("|sig-without-username"), None);
        assert_eq!(codec.decode("alice@example.com|***not-base64***"), None);
    }

    #[test]
    fn different_keys_do_not_cross_verify() {
        let raw = codec().encode("alice@example.com");
        let other = DeviceCookieCodec::new(&[8u8; 32]);
        assert_eq!(other.decode(&raw), None);
    }
}
