use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ipnetwork::IpNetwork;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use url::Url;

use crate::auth::credentials::CredentialAuthenticator;
use crate::auth::device_cookie::DeviceCookieCodec;
use crate::auth::oidc::OidcAuthenticator;
use crate::auth::proxy::ProxyAuthenticator;
use crate::auth::store::{DisabledOidc, LogNotifier, MemoryUserStore, TracingAuditLog, UserStore};
use crate::auth::{
    AuthConfig, Domain, LoginOrchestrator, MemoryCounterStore, RateLimitSettings, RateLimiter,
    User,
};
use crate::sso::session::MemorySessionStore;
use crate::sso::{self, SsoState};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub public_url: Url,
    pub secret_key: SecretString,
    pub admin_path: String,
    pub webmail_path: String,
    pub proxy_auth_header: String,
    pub proxy_auth_whitelist: Vec<IpNetwork>,
    pub proxy_auth_create: bool,
    pub proxy_auth_logout_url: Option<String>,
    pub ratelimit_ip_attempts: u64,
    pub ratelimit_ip_window: u64,
    pub ratelimit_user_attempts: u64,
    pub ratelimit_user_window: u64,
    pub device_cookie_max_age: u64,
    pub bootstrap_user: Option<String>,
    pub bootstrap_password: Option<SecretString>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is inconsistent or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = AuthConfig::new(args.public_url.clone(), &args.secret_key)
        .with_admin_path(args.admin_path)
        .with_webmail_path(args.webmail_path)
        .with_proxy_auth_header(args.proxy_auth_header)
        .with_proxy_auth_whitelist(args.proxy_auth_whitelist)
        .with_proxy_auth_create(args.proxy_auth_create)
        .with_proxy_auth_logout_url(args.proxy_auth_logout_url)
        .with_rate_limits(RateLimitSettings {
            ip_attempts: args.ratelimit_ip_attempts,
            ip_window: Duration::from_secs(args.ratelimit_ip_window),
            user_attempts: args.ratelimit_user_attempts,
            user_window: Duration::from_secs(args.ratelimit_user_window),
        })
        .with_device_cookie_max_age(args.device_cookie_max_age);

    let store = Arc::new(MemoryUserStore::new());
    seed_bootstrap_user(
        &store,
        args.bootstrap_user.as_deref(),
        args.bootstrap_password.as_ref(),
    )?;
    let users: Arc<dyn UserStore> = store;

    let audit = Arc::new(TracingAuditLog);
    let rate_limiter = Arc::new(RateLimiter::new(
        Arc::new(MemoryCounterStore::new()),
        config.rate_limits(),
        DeviceCookieCodec::new(config.device_cookie_key()),
    ));

    let orchestrator = LoginOrchestrator::new(
        config.clone(),
        rate_limiter.clone(),
        CredentialAuthenticator::new(users.clone()),
        ProxyAuthenticator::new(
            users.clone(),
            Arc::new(LogNotifier),
            audit.clone(),
            config.proxy_auth_whitelist().to_vec(),
            config.proxy_auth_create(),
        ),
        OidcAuthenticator::new(Arc::new(DisabledOidc), users, rate_limiter, audit.clone()),
        audit,
    );

    let state = Arc::new(SsoState::new(
        orchestrator,
        Arc::new(MemorySessionStore::new()),
        config,
    ));

    info!("Public URL: {}", args.public_url);

    sso::new(args.port, state).await
}

fn seed_bootstrap_user(
    store: &MemoryUserStore,
    identity: Option<&str>,
    password: Option<&SecretString>,
) -> Result<()> {
    let Some(identity) = identity else {
        warn!("No bootstrap user configured; every login will be rejected");
        return Ok(());
    };
    let password = password.context("--bootstrap-password is required with --bootstrap-user")?;
    let (localpart, domain) = identity
        .rsplit_once('@')
        .filter(|(localpart, domain)| !localpart.is_empty() && !domain.is_empty())
        .with_context(|| format!("invalid bootstrap user: {identity}"))?;

    store.add_domain(Domain {
        name: domain.to_string(),
        max_users: -1,
    });
    store.add_user(
        User {
            localpart: localpart.to_string(),
            domain: domain.to_string(),
            displayed_name: localpart.to_string(),
            app_token_capable: true,
        },
        password.expose_secret(),
    );
    info!("Seeded bootstrap user {identity}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_user_requires_a_password() {
        let store = MemoryUserStore::new();
        let result = seed_bootstrap_user(&store, Some("admin@example.com"), None);
        assert!(result.is_err());
    }

    #[test]
    fn bootstrap_user_must_be_an_address() {
        let store = MemoryUserStore::new();
        let password = SecretString::from("changeme".to_string());
        assert!(seed_bootstrap_user(&store, Some("admin"), Some(&password)).is_err());
        assert!(seed_bootstrap_user(&store, Some("@example.com"), Some(&password)).is_err());
    }

    #[test]
    fn bootstrap_user_is_seeded_with_its_domain() -> Result<()> {
        let store = MemoryUserStore::new();
        let password = SecretString::from("changeme".to_string());
        seed_bootstrap_user(&store, Some("admin@example.com"), Some(&password))?;
        assert!(store.find_by_identity("admin@example.com")?.is_some());
        assert!(store.find_domain("example.com")?.is_some());
        Ok(())
    }
}
