//! Header-asserted authentication behind a trusted reverse proxy.
//!
//! The proxy terminates authentication upstream and asserts the identity in
//! a request header. The assertion is only honored when the request arrived
//! through a whitelisted proxy address; anyone else could forge the header.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ipnetwork::IpNetwork;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

use super::error::AuthError;
use super::store::{AuditEntry, AuditLog, Notifier, UserStore};
use super::types::{normalize_identity, LoginRequest, Outcome};

pub struct ProxyAuthenticator {
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditLog>,
    whitelist: Vec<IpNetwork>,
    auto_create: bool,
}

impl ProxyAuthenticator {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditLog>,
        whitelist: Vec<IpNetwork>,
        auto_create: bool,
    ) -> Self {
        Self {
            users,
            notifier,
            audit,
            whitelist,
            auto_create,
        }
    }

    /// Decide one proxy-asserted attempt.
    ///
    /// `destination` is where the browser goes on success; the caller has
    /// already resolved and validated it.
    pub fn authenticate(
        &self,
        request: &LoginRequest,
        destination: &str,
    ) -> Result<Outcome, AuthError> {
        let entry = || {
            let mut entry = AuditEntry::default().with_client_ip(&request.client_ip);
            if let Some(proxy_ip) = request.proxy_ip {
                entry = entry.with_proxy_ip(proxy_ip.to_string());
            }
            entry
        };

        let whitelisted = request
            .proxy_ip
            .is_some_and(|ip| self.whitelist.iter().any(|network| network.contains(ip)));
        if !whitelisted {
            self.audit.warn("proxy_auth_rejected", &entry());
            return Ok(Outcome::ProxyNotWhitelisted);
        }

        let Some(identity) = request.proxy_identity.as_deref() else {
            self.audit.warn("proxy_header_missing", &entry());
            return Ok(Outcome::ProxyHeaderMissing);
        };
        let identity = normalize_identity(identity);

        if let Some(user) = self.users.find_by_identity(&identity)? {
            self.audit
                .info("proxy_login_succeeded", &entry().with_identity(&identity));
            return Ok(Outcome::Authenticated {
                user,
                destination: destination.to_string(),
                device_cookie: None,
                oidc_token: None,
            });
        }

        if !self.auto_create {
            self.audit
                .warn("proxy_unknown_identity", &entry().with_identity(&identity));
            return Ok(Outcome::UnknownIdentity);
        }

        self.provision(&identity, &entry().with_identity(&identity), destination)
    }

    /// Create the asserted user on first sight.
    fn provision(
        &self,
        identity: &str,
        entry: &AuditEntry,
        destination: &str,
    ) -> Result<Outcome, AuthError> {
        let Some((localpart, domain)) = identity
            .rsplit_once('@')
            .filter(|(localpart, domain)| !localpart.is_empty() && !domain.is_empty())
        else {
            self.audit.warn("proxy_unknown_identity", entry);
            return Ok(Outcome::UnknownIdentity);
        };

        let Some(known_domain) = self.users.find_domain(domain)? else {
            self.audit.warn("proxy_unknown_identity", entry);
            return Ok(Outcome::UnknownIdentity);
        };
        if known_domain.max_users != -1
            && self.users.count_users_in_domain(domain)? >= known_domain.max_users
        {
            self.audit.warn("proxy_domain_full", entry);
            return Ok(Outcome::DomainFull);
        }

        // The user authenticates upstream, so the local password is an
        // unguessable placeholder nobody ever types.
        let Some(password) = random_password() else {
            self.audit.warn("proxy_provisioning_failed", entry);
            return Ok(Outcome::ProvisioningFailed);
        };
        let user = match self.users.create_user(localpart, domain, &password) {
            Ok(user) => user,
            Err(error) => {
                self.audit
                    .warn("proxy_provisioning_failed", &entry.clone().with_detail(error.to_string()));
                return Ok(Outcome::ProvisioningFailed);
            }
        };

        if let Err(error) = self.notifier.send_welcome(&user) {
            warn!(user = %user.email(), %error, "welcome notification failed");
            self.audit
                .warn("welcome_notification_failed", &entry.clone().with_detail(error.to_string()));
        }

        self.audit.info("proxy_user_created", entry);
        Ok(Outcome::Authenticated {
            user,
            destination: destination.to_string(),
            device_cookie: None,
            oidc_token: None,
        })
    }
}

fn random_password() -> Option<String> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes).ok()?;
    Some(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_passwords_are_long_and_unique() {
        let first = random_password().expect("OS entropy available");
        let second = random_password().expect("OS entropy available");
        assert!(first.len() >= 40);
        assert_ne!(first, second);
    }
}
