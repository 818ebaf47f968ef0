//! Server-side session storage.
//!
//! Session identifiers are opaque random tokens; the identifier is always
//! regenerated at privilege change so a pre-login identifier can never name
//! an authenticated session.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::auth::User;

pub const SESSION_COOKIE_NAME: &str = "portone_session";

pub trait SessionStore: Send + Sync {
    /// Discard `previous` (if any) and mint a fresh anonymous session,
    /// returning its identifier.
    fn regenerate_session_id(&self, previous: Option<&str>) -> String;
    fn set_principal(&self, session_id: &str, user: User);
    fn principal(&self, session_id: &str) -> Option<User>;
    /// Bind the provider's raw token response to the session, so downstream
    /// consumers can act on behalf of the user for its lifetime.
    fn set_oidc_token(&self, session_id: &str, token: String);
    fn oidc_token(&self, session_id: &str) -> Option<String>;
    fn destroy(&self, session_id: &str);
}

#[derive(Clone, Debug, Default)]
struct Session {
    principal: Option<User>,
    oidc_token: Option<String>,
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn regenerate_session_id(&self, previous: Option<&str>) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let session_id = URL_SAFE_NO_PAD.encode(bytes);
        let mut sessions = self.lock();
        if let Some(previous) = previous {
            sessions.remove(previous);
        }
        sessions.insert(session_id.clone(), Session::default());
        session_id
    }

    fn set_principal(&self, session_id: &str, user: User) {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get_mut(session_id) {
            session.principal = Some(user);
        }
    }

    fn principal(&self, session_id: &str) -> Option<User> {
        self.lock()
            .get(session_id)
            .and_then(|session| session.principal.clone())
    }

    fn set_oidc_token(&self, session_id: &str, token: String) {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get_mut(session_id) {
            session.oidc_token = Some(token);
        }
    }

    fn oidc_token(&self, session_id: &str) -> Option<String> {
        self.lock()
            .get(session_id)
            .and_then(|session| session.oidc_token.clone())
    }

    fn destroy(&self, session_id: &str) {
        self.lock().remove(session_id);
    }
}
