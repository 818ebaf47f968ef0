//! OpenID-Connect callback handling.
//!
//! The provider seam does the actual code exchange; this layer maps the
//! exchanged identity onto a local user. OIDC never provisions accounts:
//! an identity the store does not know is rejected outright.

use std::sync::Arc;

use super::error::AuthError;
use super::rate_limit::RateLimiter;
use super::store::{AuditEntry, AuditLog, OidcProvider, UserStore};
use super::types::{normalize_identity, LoginRequest, Outcome, RateLimitScope};
use url::Url;

pub struct OidcAuthenticator {
    provider: Arc<dyn OidcProvider>,
    users: Arc<dyn UserStore>,
    rate_limiter: Arc<RateLimiter>,
    audit: Arc<dyn AuditLog>,
}

impl OidcAuthenticator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn OidcProvider>,
        users: Arc<dyn UserStore>,
        rate_limiter: Arc<RateLimiter>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            provider,
            users,
            rate_limiter,
            audit,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.provider.is_enabled()
    }

    /// Where to send the browser to start the flow, when enabled.
    #[must_use]
    pub fn begin_login(&self) -> Option<Url> {
        self.provider.authorization_redirect_url()
    }

    /// Finish the flow from the provider's callback.
    pub fn complete_login(
        &self,
        request: &LoginRequest,
        destination: &str,
    ) -> Result<Outcome, AuthError> {
        let entry = AuditEntry::default().with_client_ip(&request.client_ip);
        let query = request.oidc_query.as_deref().unwrap_or_default();

        let identity = match self.provider.exchange_code(query) {
            Ok(identity) => identity,
            Err(error) => {
                self.audit.warn(
                    "oidc_exchange_failed",
                    &entry.clone().with_detail(error.to_string()),
                );
                return Ok(Outcome::OidcExchangeFailed);
            }
        };
        let username = normalize_identity(&identity.email);
        let entry = entry.with_identity(&username);

        // The provider already authenticated the user, but the callback is
        // still an unauthenticated endpoint and stays throttled like any
        // other credential check.
        if self.rate_limiter.should_rate_limit_ip(&request.client_ip) {
            self.audit
                .warn("login_rate_limited", &entry.clone().with_detail("ip scope"));
            return Ok(Outcome::RateLimited {
                scope: RateLimitScope::Ip,
            });
        }
        let (cookie, cookie_username) = self
            .rate_limiter
            .parse_device_cookie(request.device_cookie.as_deref());
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

        let Some(mut user) = self.users.find_by_identity(&username)? else {
            self.rate_limiter
                .record_failure(RateLimitScope::Ip, &request.client_ip);
            self.audit.warn("oidc_unknown_identity", &entry);
            return Ok(Outcome::UnknownIdentity);
        };

        if user.displayed_name != identity.display_name && !identity.display_name.is_empty() {
            self.users
                .set_display_name(&username, &identity.display_name)?;
            user.displayed_name = identity.display_name.clone();
        }

        self.audit.info("oidc_login_succeeded", &entry);
        Ok(Outcome::Authenticated {
            device_cookie: Some(self.rate_limiter.device_cookie(&username)),
            user,
            destination: destination.to_string(),
            oidc_token: Some(identity.raw_token),
        })
    }
}
