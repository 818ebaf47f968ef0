//! # Portone (SSO front-door)
//!
//! `portone` is the single sign-on front-door of a mail admin suite. Every
//! browser login for the proxied admin and webmail applications goes through
//! it: it checks credentials (or a proxy-asserted identity, or an OIDC
//! callback), throttles failed attempts per client IP and per username, and
//! hands the browser a session plus a signed "remembered device" cookie.
//!
//! ## Trust model
//!
//! - Form credentials are verified against the user store; unknown users and
//!   wrong passwords are indistinguishable to the caller.
//! - Header-asserted identities are honored only from whitelisted proxy
//!   addresses, optionally auto-provisioning the user.
//! - OIDC identities come from an external provider and are never
//!   auto-provisioned.
//!
//! The decision engine lives in [`auth`], the HTTP surface in [`sso`], and
//! process wiring in [`cli`].

pub mod auth;
pub mod cli;
pub mod sso;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_hash_is_never_empty() {
        assert!(!GIT_COMMIT_HASH.is_empty());
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert!(APP_USER_AGENT.starts_with("portone/"));
    }
}
