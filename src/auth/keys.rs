//! Purpose-scoped HMAC sub-keys derived from the process master secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Purpose label for the device-cookie signing key.
pub const DEVICE_COOKIE_KEY: &str = "DEVICE_COOKIE_KEY";

/// Derive a sub-key for one purpose from the long-lived master secret.
///
/// Computed once at startup and held as immutable configuration, never
/// recomputed per request.
#[must_use]
pub fn derive_key(master: &SecretString, purpose: &str) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(master.expose_secret().as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(purpose.as_bytes());
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_stable_per_purpose() {
        let master = SecretString::from("changeme".to_string());
        assert_eq!(
            derive_key(&master, DEVICE_COOKIE_KEY),
            derive_key(&master, DEVICE_COOKIE_KEY)
        );
    }

    #[test]
    fn derive_key_separates_purposes_and_masters() {
        let master = SecretString::from("changeme".to_string());
        let other = SecretString::from("changeme2".to_string());
        assert_ne!(
            derive_key(&master, DEVICE_COOKIE_KEY),
            derive_key(&master, "WEBMAIL_TEMP_TOKEN_KEY")
        );
        assert_ne!(
            derive_key(&master, DEVICE_COOKIE_KEY),
            derive_key(&other, DEVICE_COOKIE_KEY)
        );
    }
}
