//! Adaptive rate limiting for credential checking.
//!
//! Flow overview:
//! 1) Track failed attempts per IP and per username in isolated counters.
//! 2) Throttle once a scope's count reaches its configured threshold within
//!    the configured window; failures older than the window do not count.
//! 3) Let a valid "remembered device" cookie skip the user-scope check only.
//!
//! Counters live behind the [`CounterStore`] seam so hosts can swap the
//! in-memory store for an external atomic-counter service, and tests can
//! substitute a store with a controllable clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::device_cookie::{DeviceCookie, DeviceCookieCodec};
use super::types::RateLimitScope;

const DEFAULT_IP_ATTEMPTS: u64 = 60;
const DEFAULT_IP_WINDOW: Duration = Duration::from_secs(60 * 60);
const DEFAULT_USER_ATTEMPTS: u64 = 100;
const DEFAULT_USER_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Clock seam so tests can control window expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Failure-counter storage.
///
/// Implementations must not lose concurrent increments for the same key;
/// per-key atomicity is enough, no cross-key ordering is required.
pub trait CounterStore: Send + Sync {
    /// Current failure count for `(scope, key)`, zero once the window expired.
    fn count(&self, scope: RateLimitScope, key: &str) -> u64;
    /// Record one failure and reset the expiry window. Returns the new count.
    fn record(&self, scope: RateLimitScope, key: &str, window: Duration) -> u64;
}

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// Single-process counter store: one mutex over a keyed map, windowed
/// eviction on write.
pub struct MemoryCounterStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<(RateLimitScope, String), CounterEntry>>,
}

impl MemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for MemoryCounterStore {
    fn count(&self, scope: RateLimitScope, key: &str) -> u64 {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&(scope, key.to_string())) {
            Some(entry) if entry.expires_at > now => entry.count,
            _ => 0,
        }
    }

    fn record(&self, scope: RateLimitScope, key: &str, window: Duration) -> u64 {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.expires_at > now);
        let entry = entries
            .entry((scope, key.to_string()))
            .or_insert(CounterEntry {
                count: 0,
                expires_at: now + window,
            });
        entry.count += 1;
        entry.expires_at = now + window;
        entry.count
    }
}

/// Thresholds and windows, constant for the process lifetime.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitSettings {
    pub ip_attempts: u64,
    pub ip_window: Duration,
    pub user_attempts: u64,
    pub user_window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            ip_attempts: DEFAULT_IP_ATTEMPTS,
            ip_window: DEFAULT_IP_WINDOW,
            user_attempts: DEFAULT_USER_ATTEMPTS,
            user_window: DEFAULT_USER_WINDOW,
        }
    }
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    settings: RateLimitSettings,
    codec: DeviceCookieCodec,
}

impl RateLimiter {
    #[must_use]
    pub fn new(
        store: Arc<dyn CounterStore>,
        settings: RateLimitSettings,
        codec: DeviceCookieCodec,
    ) -> Self {
        Self {
            store,
            settings,
            codec,
        }
    }

    #[must_use]
    pub fn should_rate_limit_ip(&self, ip: &str) -> bool {
        self.store.count(RateLimitScope::Ip, ip) >= self.settings.ip_attempts
    }

    /// Whether the per-user throttle applies.
    ///
    /// A device that just authenticated successfully for this very username
    /// skips the user-scope check. The bypass never extends to the IP scope,
    /// so it cannot defeat IP throttling en masse.
    #[must_use]
    pub fn should_rate_limit_user(
        &self,
        username: &str,
        ip: &str,
        device_cookie: Option<&DeviceCookie>,
        device_cookie_username: Option<&str>,
    ) -> bool {
        if let (Some(cookie), Some(cookie_username)) = (device_cookie, device_cookie_username) {
            if cookie_username == username && cookie.username == username {
                debug!(username, ip, "device cookie bypasses user-scope throttle");
                return false;
            }
        }
        self.store.count(RateLimitScope::User, username) >= self.settings.user_attempts
    }

    /// Record one failed attempt against a scope, resetting its window.
    pub fn record_failure(&self, scope: RateLimitScope, key: &str) {
        let window = match scope {
            RateLimitScope::Ip => self.settings.ip_window,
            RateLimitScope::User => self.settings.user_window,
        };
        let count = self.store.record(scope, key, window);
        debug!(?scope, key, count, "recorded failed attempt");
    }

    /// Issue a fresh signed device cookie after a successful login.
    #[must_use]
    pub fn device_cookie(&self, username: &str) -> String {
        self.codec.encode(username)
    }

    /// Parse a raw `rate_limit` cookie. Fails soft on malformed or unsigned
    /// input: `(None, None)`.
    #[must_use]
    pub fn parse_device_cookie(&self, raw: Option<&str>) -> (Option<DeviceCookie>, Option<String>) {
        match raw.and_then(|raw| self.codec.decode(raw)) {
            Some(cookie) => {
                let username = cookie.username.clone();
                (Some(cookie), Some(username))
            }
            None => (None, None),
        }
    }
}
