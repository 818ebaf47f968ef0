//! Collaborator seams consumed by the engine, plus in-memory defaults.
//!
//! Persistence, OIDC token exchange, audit logging, and welcome delivery are
//! external concerns behind narrow traits. The calls are opaque and
//! synchronous from the engine's perspective; hosts may back them with
//! whatever they like.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use url::Url;

use super::error::{NotifyError, OidcError, StoreError};
use super::types::{normalize_identity, Domain, User};

/// User and domain persistence.
pub trait UserStore: Send + Sync {
    fn find_by_identity(&self, identity: &str) -> Result<Option<User>, StoreError>;
    fn verify_password(&self, user: &User, plaintext: &str) -> Result<bool, StoreError>;
    /// Create and persist a user atomically; partial creations must not be
    /// observable.
    fn create_user(
        &self,
        localpart: &str,
        domain: &str,
        password: &str,
    ) -> Result<User, StoreError>;
    fn set_display_name(&self, identity: &str, name: &str) -> Result<(), StoreError>;
    fn find_domain(&self, name: &str) -> Result<Option<Domain>, StoreError>;
    fn count_users_in_domain(&self, domain: &str) -> Result<i64, StoreError>;
}

/// Identity returned by a successful authorization-code exchange.
#[derive(Clone, Debug)]
pub struct OidcIdentity {
    pub email: String,
    pub display_name: String,
    /// Raw token response, kept for the session layer.
    pub raw_token: String,
}

/// The external OpenID-Connect client.
pub trait OidcProvider: Send + Sync {
    fn is_enabled(&self) -> bool;
    /// Where to send the browser to start the flow, when enabled.
    fn authorization_redirect_url(&self) -> Option<Url>;
    fn exchange_code(&self, query: &str) -> Result<OidcIdentity, OidcError>;
}

/// Provider used when OIDC is switched off at the system level.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledOidc;

impl OidcProvider for DisabledOidc {
    fn is_enabled(&self) -> bool {
        false
    }

    fn authorization_redirect_url(&self) -> Option<Url> {
        None
    }

    fn exchange_code(&self, _query: &str) -> Result<OidcIdentity, OidcError> {
        Err(OidcError::Disabled)
    }
}

/// Context attached to every audit record.
#[derive(Clone, Debug, Default)]
pub struct AuditEntry {
    pub identity: Option<String>,
    pub client_ip: Option<String>,
    pub proxy_ip: Option<String>,
    pub detail: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    #[must_use]
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    #[must_use]
    pub fn with_proxy_ip(mut self, proxy_ip: impl Into<String>) -> Self {
        self.proxy_ip = Some(proxy_ip.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Security audit sink. Every rejection and every success produces exactly
/// one record with enough context to investigate abuse.
pub trait AuditLog: Send + Sync {
    fn info(&self, event: &str, entry: &AuditEntry);
    fn warn(&self, event: &str, entry: &AuditEntry);
}

/// Default sink: structured records under the `audit` tracing target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn info(&self, event: &str, entry: &AuditEntry) {
        info!(
            target: "audit",
            event,
            identity = entry.identity.as_deref(),
            client_ip = entry.client_ip.as_deref(),
            proxy_ip = entry.proxy_ip.as_deref(),
            detail = entry.detail.as_deref(),
        );
    }

    fn warn(&self, event: &str, entry: &AuditEntry) {
        warn!(
            target: "audit",
            event,
            identity = entry.identity.as_deref(),
            client_ip = entry.client_ip.as_deref(),
            proxy_ip = entry.proxy_ip.as_deref(),
            detail = entry.detail.as_deref(),
        );
    }
}

/// Outbound welcome notification for freshly provisioned users.
pub trait Notifier: Send + Sync {
    fn send_welcome(&self, user: &User) -> Result<(), NotifyError>;
}

/// Logs the welcome instead of sending mail; delivery is a host concern.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_welcome(&self, user: &User) -> Result<(), NotifyError> {
        info!(user = %user.email(), "welcome notification queued");
        Ok(())
    }
}

struct UserRecord {
    user: User,
    password_hash: Vec<u8>,
    app_token_hashes: Vec<Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    domains: HashMap<String, Domain>,
}

/// In-memory user store. Backs the binary and the tests; the real suite
/// plugs its ORM in behind the same trait.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_domain(&self, domain: Domain) {
        let mut inner = self.lock();
        inner.domains.insert(domain.name.clone(), domain);
    }

    pub fn add_user(&self, user: User, password: &str) {
        let mut inner = self.lock();
        inner.users.insert(
            normalize_identity(&user.email()),
            UserRecord {
                user,
                password_hash: hash_secret(password),
                app_token_hashes: Vec::new(),
            },
        );
    }

    pub fn add_app_token(&self, identity: &str, token: &str) {
        let mut inner = self.lock();
        if let Some(record) = inner.users.get_mut(&normalize_identity(identity)) {
            record.app_token_hashes.push(hash_secret(token));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_identity(&self, identity: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .users
            .get(&normalize_identity(identity))
            .map(|record| record.user.clone()))
    }

    fn verify_password(&self, user: &User, plaintext: &str) -> Result<bool, StoreError> {
        let inner = self.lock();
        let Some(record) = inner.users.get(&normalize_identity(&user.email())) else {
            return Ok(false);
        };
        let candidate = hash_secret(plaintext);
        if record.password_hash == candidate {
            return Ok(true);
        }
        Ok(record.user.app_token_capable
            && record.app_token_hashes.iter().any(|hash| *hash == candidate))
    }

    fn create_user(
        &self,
        localpart: &str,
        domain: &str,
        password: &str,
    ) -> Result<User, StoreError> {
        let user = User {
            localpart: localpart.to_string(),
            domain: domain.to_string(),
            displayed_name: localpart.to_string(),
            app_token_capable: false,
        };
        let key = normalize_identity(&user.email());
        let mut inner = self.lock();
        if inner.users.contains_key(&key) {
            return Err(StoreError::Constraint(format!("user {key} already exists")));
        }
        inner.users.insert(
            key,
            UserRecord {
                user: user.clone(),
                password_hash: hash_secret(password),
                app_token_hashes: Vec::new(),
            },
        );
        Ok(user)
    }

    fn set_display_name(&self, identity: &str, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .users
            .get_mut(&normalize_identity(identity))
            .ok_or_else(|| StoreError::Constraint(format!("no such user: {identity}")))?;
        record.user.displayed_name = name.to_string();
        Ok(())
    }

    fn find_domain(&self, name: &str) -> Result<Option<Domain>, StoreError> {
        let inner = self.lock();
        Ok(inner.domains.get(&normalize_identity(name)).cloned())
    }

    fn count_users_in_domain(&self, domain: &str) -> Result<i64, StoreError> {
        let inner = self.lock();
        let domain = normalize_identity(domain);
        // Stored domains come straight from the caller and may carry mixed
        // case; compare normalized on both sides.
        let count = inner
            .users
            .values()
            .filter(|record| normalize_identity(&record.user.domain) == domain)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

fn hash_secret(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            localpart: "alice".to_string(),
            domain: "example.com".to_string(),
            displayed_name: "Alice".to_string(),
            app_token_capable: true,
        }
    }

    #[test]
    fn find_and_verify_round_trip() -> Result<(), StoreError> {
        let store = MemoryUserStore::new();
        store.add_user(alice(), "hunter2");

        let user = store
            .find_by_identity("Alice@Example.com")
            .map(|user| user.expect("user should exist"))?;
        assert!(store.verify_password(&user, "hunter2")?);
        assert!(!store.verify_password(&user, "hunter3")?);
        Ok(())
    }

    #[test]
    fn app_tokens_verify_only_for_capable_users() -> Result<(), StoreError> {
        let store = MemoryUserStore::new();
        store.add_user(alice(), "hunter2");
        store.add_app_token("alice@example.com", "0123456789abcdef0123456789abcdef");

        let mut user = store
            .find_by_identity("alice@example.com")
            .map(|user| user.expect("user should exist"))?;
        assert!(store.verify_password(&user, "0123456789abcdef0123456789abcdef")?);

        user.app_token_capable = false;
        store.add_user(user.clone(), "hunter2");
        assert!(!store.verify_password(&user, "0123456789abcdef0123456789abcdef")?);
        Ok(())
    }

    #[test]
    fn create_user_rejects_duplicates() {
        let store = MemoryUserStore::new();
        store.add_user(alice(), "hunter2");
        let result = store.create_user("alice", "example.com", "whatever");
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[test]
    fn count_users_in_domain_only_counts_that_domain() -> Result<(), StoreError> {
        let store = MemoryUserStore::new();
        store.add_user(alice(), "hunter2");
        store.create_user("bob", "example.com", "pw")?;
        store.create_user("carol", "other.example", "pw")?;
        assert_eq!(store.count_users_in_domain("example.com")?, 2);
        assert_eq!(store.count_users_in_domain("other.example")?, 1);
        Ok(())
    }

    #[test]
    fn count_users_in_domain_ignores_domain_case() -> Result<(), StoreError> {
        let store = MemoryUserStore::new();
        let mut user = alice();
        user.domain = "Example.COM".to_string();
        store.add_user(user, "hunter2");
        store.create_user("bob", "example.com", "pw")?;
        assert_eq!(store.count_users_in_domain("example.com")?, 2);
        assert_eq!(store.count_users_in_domain("EXAMPLE.com")?, 2);
        Ok(())
    }

    #[test]
    fn set_display_name_updates_the_record() -> Result<(), StoreError> {
        let store = MemoryUserStore::new();
        store.add_user(alice(), "hunter2");
        store.set_display_name("alice@example.com", "Alice A.")?;
        let user = store
            .find_by_identity("alice@example.com")?
            .expect("user should exist");
        assert_eq!(user.displayed_name, "Alice A.");
        Ok(())
    }
}
