//! Error taxonomy for the login engine.
//!
//! User-facing rejections are `Outcome` variants, not errors. The types here
//! cover the other side of the split: collaborator faults the orchestrator
//! refuses to interpret as an authentication decision.

use thiserror::Error;

/// Failure inside an external store (users, domains, sessions).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// Infrastructure failure surfaced to the caller as-is; never mistaken for
/// `InvalidCredentials`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user store failure: {0}")]
    Store(#[from] StoreError),
}

/// Failure reported by the OIDC provider collaborator.
#[derive(Clone, Debug, Error)]
pub enum OidcError {
    #[error("OIDC is disabled")]
    Disabled,
    #[error("code exchange failed: {0}")]
    Exchange(String),
}

/// Failure delivering a welcome notification. Never rolls back the user
/// creation it follows.
#[derive(Debug, Error)]
#[error("welcome notification failed: {0}")]
pub struct NotifyError(pub String);
