//! Core data model for login decisions.

use secrecy::SecretString;
use std::net::IpAddr;
use url::Url;

/// How the caller wants this attempt authenticated.
///
/// The mode is decided once at the web boundary so the engine dispatches on
/// an explicit tag instead of re-deriving intent from raw headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginMode {
    Form,
    Proxy,
    OidcCallback,
}

/// Unit of isolation for failure counters: a blocked IP does not block a
/// different IP, a blocked user does not block other users behind that IP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    Ip,
    User,
}

/// One login attempt. Transient, one per call.
#[derive(Debug)]
pub struct LoginRequest {
    pub mode: LoginMode,
    /// Client address as asserted by `X-Real-IP` or the socket peer.
    pub client_ip: String,
    /// Address of the reverse proxy in front of us, if any.
    pub proxy_ip: Option<IpAddr>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Value of the externally-asserted identity header.
    pub proxy_identity: Option<String>,
    /// Raw query string of the OIDC callback.
    pub oidc_query: Option<String>,
    /// Caller-supplied redirect target, not yet validated.
    pub redirect_hint: Option<String>,
    /// Raw `rate_limit` cookie, if presented.
    pub device_cookie: Option<String>,
    pub current_url: Url,
    /// Attempt originated from the public homepage.
    pub from_homepage: bool,
    /// The admin form button was submitted.
    pub admin_submit: bool,
}

/// A mail user, owned by the external store; read-only here except for
/// display-name updates and proxy provisioning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub localpart: String,
    pub domain: String,
    pub displayed_name: String,
    /// Whether application-scoped tokens may authenticate this user.
    pub app_token_capable: bool,
}

impl User {
    #[must_use]
    pub fn email(&self) -> String {
        format!("{}@{}", self.localpart, self.domain)
    }
}

/// A mail domain, owned by the external store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    /// `-1` means unlimited.
    pub max_users: i64,
}

/// Decision for one attempt.
///
/// Every variant is a normal, user-facing answer. Infrastructure faults
/// (store unavailable and the like) travel as [`super::error::AuthError`]
/// and are never folded into an `Outcome`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Authenticated {
        user: User,
        destination: String,
        /// Serialized `rate_limit` cookie to hand back, when one is issued.
        device_cookie: Option<String>,
        /// Raw token response from the provider, bound to the session on
        /// OIDC logins.
        oidc_token: Option<String>,
    },
    RateLimited {
        scope: RateLimitScope,
    },
    InvalidCredentials,
    UnknownIdentity,
    ProxyNotWhitelisted,
    ProxyHeaderMissing,
    DomainFull,
    ProvisioningFailed,
    OidcExchangeFailed,
}

/// Normalize an identity for lookups and rate-limit keys.
#[must_use]
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_email_joins_localpart_and_domain() {
        let user = User {
            localpart: "alice".to_string(),
            domain: "example.com".to_string(),
            displayed_name: "Alice".to_string(),
            app_token_capable: false,
        };
        assert_eq!(user.email(), "alice@example.com");
    }

    #[test]
    fn normalize_identity_trims_and_lowercases() {
        assert_eq!(normalize_identity(" Alice@Example.COM "), "alice@example.com");
    }
}
