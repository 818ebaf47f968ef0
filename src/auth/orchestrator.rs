//! Single entry point for login decisions.
//!
//! Each attempt goes through exactly one path, picked by the mode the web
//! boundary tagged it with. Throttling wraps the credential check: the IP
//! scope is consulted first, then the user scope, and only a failed check of
//! actual credentials increments a counter.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::config::AuthConfig;
use super::credentials::CredentialAuthenticator;
use super::error::AuthError;
use super::oidc::OidcAuthenticator;
use super::proxy::ProxyAuthenticator;
use super::rate_limit::RateLimiter;
use super::redirect;
use super::store::{AuditEntry, AuditLog};
use super::types::{normalize_identity, LoginMode, LoginRequest, Outcome, RateLimitScope};

pub struct LoginOrchestrator {
    config: AuthConfig,
    rate_limiter: Arc<RateLimiter>,
    credentials: CredentialAuthenticator,
    proxy: ProxyAuthenticator,
    oidc: OidcAuthenticator,
    audit: Arc<dyn AuditLog>,
}

impl LoginOrchestrator {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        rate_limiter: Arc<RateLimiter>,
        credentials: CredentialAuthenticator,
        proxy: ProxyAuthenticator,
        oidc: OidcAuthenticator,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            config,
            rate_limiter,
            credentials,
            proxy,
            oidc,
            audit,
        }
    }

    #[must_use]
    pub fn oidc(&self) -> &OidcAuthenticator {
        &self.oidc
    }

    /// Decide one login attempt.
    pub fn login(&self, request: &LoginRequest) -> Result<Outcome, AuthError> {
        match request.mode {
            LoginMode::Proxy => {
                let destination = self.destination(request, true);
                self.proxy.authenticate(request, &destination)
            }
            LoginMode::OidcCallback => self.oidc.complete_login(request, self.config.admin_path()),
            LoginMode::Form => self.form_login(request),
        }
    }

    fn form_login(&self, request: &LoginRequest) -> Result<Outcome, AuthError> {
        let (Some(username), Some(password)) =
            (request.username.as_deref(), request.password.as_ref())
        else {
            return Ok(Outcome::InvalidCredentials);
        };
        let username = normalize_identity(username);
        let entry = AuditEntry::default()
            .with_identity(&username)
            .with_client_ip(&request.client_ip);

        let (cookie, cookie_username) = self
            .rate_limiter
            .parse_device_cookie(request.device_cookie.as_deref());

        // Application tokens are machine credentials retried on schedule;
        // throttling them would lock real clients out of their mailboxes.
        let app_token = CredentialAuthenticator::is_app_token(password);
        if !app_token {
            if self.rate_limiter.should_rate_limit_ip(&request.client_ip) {
                self.audit
                    .warn("login_rate_limited", &entry.clone().with_detail("ip scope"));
                return Ok(Outcome::RateLimited {
                    scope: RateLimitScope::Ip,
                });
            }
            if self.rate_limiter.should_rate_limit_user(
                &username,
                &request.client_ip,
                cookie.as_ref(),
                cookie_username.as_deref(),
            ) {
                self.audit
                    .warn("login_rate_limited", &entry.clone().with_detail("user scope"));
                return Ok(Outcome::RateLimited {
                    scope: RateLimitScope::User,
                });
            }
        }

        if let Some(user) = self.credentials.authenticate(&username, password)? {
            let destination = self.destination(request, false);
            self.audit.info("login_succeeded", &entry);
            return Ok(Outcome::Authenticated {
                device_cookie: Some(self.rate_limiter.device_cookie(&username)),
                user,
                destination,
                oidc_token: None,
            });
        }

        // Attribute the failure to the user scope only when the username is
        // real; otherwise a spray of invented usernames would never trip the
        // IP throttle.
        if self.credentials.known_user(&username)? {
            self.rate_limiter
                .record_failure(RateLimitScope::User, &username);
        } else {
            self.rate_limiter
                .record_failure(RateLimitScope::Ip, &request.client_ip);
        }
        let event = if app_token {
            "app_token_login_failed"
        } else {
            "login_failed"
        };
        self.audit.warn(event, &entry);
        Ok(Outcome::InvalidCredentials)
    }

    /// Resolve where the browser goes after a successful login.
    fn destination(&self, request: &LoginRequest, is_proxied: bool) -> String {
        if let Some(target) = self.usable_redirect(request, is_proxied) {
            return target.to_string();
        }
        if is_proxied || request.admin_submit {
            self.config.admin_path().to_string()
        } else {
            self.config.webmail_path().to_string()
        }
    }

    /// The caller-supplied redirect hint, if it is safe to honor.
    fn usable_redirect(&self, request: &LoginRequest, is_proxied: bool) -> Option<Url> {
        // Links on the public homepage carry an untrusted `url` parameter;
        // only the proxy path may follow it.
        if request.from_homepage && !is_proxied {
            return None;
        }
        let hint = request.redirect_hint.as_deref()?;
        let target = redirect::validate(hint, &request.current_url);
        if target.is_none() {
            debug!(hint, "rejected redirect hint");
        }
        target
    }
}
