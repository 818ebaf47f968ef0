//! Front-door configuration, immutable for the process lifetime.

use ipnetwork::IpNetwork;
use secrecy::SecretString;
use url::Url;

use super::keys;
use super::rate_limit::RateLimitSettings;

const DEFAULT_ADMIN_PATH: &str = "/admin";
const DEFAULT_WEBMAIL_PATH: &str = "/webmail";
const DEFAULT_PROXY_AUTH_HEADER: &str = "X-Auth-Email";
// One year, matching the original suite's remembered-device lifetime.
const DEFAULT_DEVICE_COOKIE_MAX_AGE: u64 = 31_536_000;
const LOGIN_PATH: &str = "/sso/login";

#[derive(Clone)]
pub struct AuthConfig {
    public_url: Url,
    admin_path: String,
    webmail_path: String,
    proxy_auth_header: String,
    proxy_auth_whitelist: Vec<IpNetwork>,
    proxy_auth_create: bool,
    proxy_auth_logout_url: Option<String>,
    rate_limits: RateLimitSettings,
    device_cookie_max_age: u64,
    device_cookie_key: [u8; 32],
}

impl AuthConfig {
    /// Build a configuration with defaults, deriving the device-cookie key
    /// from the application's long-lived secret once, up front.
    #[must_use]
    pub fn new(public_url: Url, secret_key: &SecretString) -> Self {
        Self {
            public_url,
            admin_path: DEFAULT_ADMIN_PATH.to_string(),
            webmail_path: DEFAULT_WEBMAIL_PATH.to_string(),
            proxy_auth_header: DEFAULT_PROXY_AUTH_HEADER.to_string(),
            proxy_auth_whitelist: Vec::new(),
            proxy_auth_create: false,
            proxy_auth_logout_url: None,
            rate_limits: RateLimitSettings::default(),
            device_cookie_max_age: DEFAULT_DEVICE_COOKIE_MAX_AGE,
            device_cookie_key: keys::derive_key(secret_key, keys::DEVICE_COOKIE_KEY),
        }
    }

    #[must_use]
    pub fn with_admin_path(mut self, path: impl Into<String>) -> Self {
        self.admin_path = path.into();
        self
    }

    #[must_use]
    pub fn with_webmail_path(mut self, path: impl Into<String>) -> Self {
        self.webmail_path = path.into();
        self
    }

    #[must_use]
    pub fn with_proxy_auth_header(mut self, header: impl Into<String>) -> Self {
        self.proxy_auth_header = header.into();
        self
    }

    #[must_use]
    pub fn with_proxy_auth_whitelist(mut self, whitelist: Vec<IpNetwork>) -> Self {
        self.proxy_auth_whitelist = whitelist;
        self
    }

    #[must_use]
    pub fn with_proxy_auth_create(mut self, create: bool) -> Self {
        self.proxy_auth_create = create;
        self
    }

    #[must_use]
    pub fn with_proxy_auth_logout_url(mut self, url: Option<String>) -> Self {
        self.proxy_auth_logout_url = url;
        self
    }

    #[must_use]
    pub fn with_rate_limits(mut self, rate_limits: RateLimitSettings) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    #[must_use]
    pub fn with_device_cookie_max_age(mut self, seconds: u64) -> Self {
        self.device_cookie_max_age = seconds;
        self
    }

    #[must_use]
    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    #[must_use]
    pub fn admin_path(&self) -> &str {
        &self.admin_path
    }

    #[must_use]
    pub fn webmail_path(&self) -> &str {
        &self.webmail_path
    }

    #[must_use]
    pub fn proxy_auth_header(&self) -> &str {
        &self.proxy_auth_header
    }

    #[must_use]
    pub fn proxy_auth_whitelist(&self) -> &[IpNetwork] {
        &self.proxy_auth_whitelist
    }

    #[must_use]
    pub fn proxy_auth_create(&self) -> bool {
        self.proxy_auth_create
    }

    #[must_use]
    pub fn proxy_auth_logout_url(&self) -> Option<&str> {
        self.proxy_auth_logout_url.as_deref()
    }

    #[must_use]
    pub fn rate_limits(&self) -> RateLimitSettings {
        self.rate_limits
    }

    #[must_use]
    pub fn device_cookie_max_age(&self) -> u64 {
        self.device_cookie_max_age
    }

    #[must_use]
    pub fn device_cookie_key(&self) -> &[u8; 32] {
        &self.device_cookie_key
    }

    /// The login endpoint; the device cookie is path-scoped to it.
    #[must_use]
    pub fn login_path(&self) -> &'static str {
        LOGIN_PATH
    }

    /// Only mark cookies secure when the front-door is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.public_url.scheme() == "https"
    }
}
