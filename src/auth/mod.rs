//! Login decision engine for the SSO front-door.
//!
//! Every login attempt, whatever its channel, is reduced to one
//! [`types::LoginRequest`] at the web boundary and decided here. The engine
//! composes three authenticators (form credentials, proxy identity header,
//! OIDC callback) with an adaptive rate limiter and an open-redirect guard,
//! and always answers with a [`types::Outcome`].
//!
//! ## Rate limiting
//!
//! Failed attempts are counted in two isolated scopes:
//!
//! - **IP scope** catches a single source hammering many accounts without
//!   locking out other clients behind the same NAT.
//! - **User scope** catches a targeted brute force from rotating IPs.
//!
//! A signed "remembered device" cookie issued on successful login bypasses
//! the user-scope check only; the IP-scope check always applies. App tokens
//! (pre-shared, high-entropy) skip throttling entirely.
//!
//! ## Trust anchors
//!
//! Proxy authentication trusts a CIDR whitelist, not attempt frequency, and
//! is therefore never rate limited. OIDC identities are asserted by an
//! external provider and are throttled exactly like form logins, keyed on
//! the returned email.

pub mod config;
pub mod credentials;
pub mod device_cookie;
pub mod error;
pub mod keys;
pub mod oidc;
pub mod orchestrator;
pub mod proxy;
pub mod rate_limit;
pub mod redirect;
pub mod store;
pub mod types;

pub use config::AuthConfig;
pub use orchestrator::LoginOrchestrator;
pub use rate_limit::{MemoryCounterStore, RateLimitSettings, RateLimiter};
pub use types::{Domain, LoginMode, LoginRequest, Outcome, RateLimitScope, User};
