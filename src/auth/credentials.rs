//! Username/password and app-token validation against the user store.

use std::sync::Arc;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use super::error::StoreError;
use super::store::UserStore;
use super::types::User;

pub struct CredentialAuthenticator {
    users: Arc<dyn UserStore>,
}

impl CredentialAuthenticator {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Check a credential pair.
    ///
    /// Unknown user and wrong password both come back as `None`; the caller
    /// must not be able to tell them apart, so usernames cannot be
    /// enumerated through this path.
    pub fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<User>, StoreError> {
        let Some(user) = self.users.find_by_identity(username)? else {
            return Ok(None);
        };
        if self.users.verify_password(&user, password.expose_secret())? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Whether the username maps to a local user at all. Used for failure
    /// attribution, never exposed to the requester.
    pub fn known_user(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.users.find_by_identity(username)?.is_some())
    }

    /// Application-scoped tokens are pre-shared 32-char hex secrets handed
    /// to mail clients. They are not guessable passwords, so throttling them
    /// would only hurt clients retrying with a stale token.
    #[must_use]
    pub fn is_app_token(password: &SecretString) -> bool {
        Regex::new(r"^[0-9a-f]{32}$").is_ok_and(|re| re.is_match(password.expose_secret()))
    }
}
