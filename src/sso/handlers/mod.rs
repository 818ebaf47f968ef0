pub mod health;
pub mod login;
pub mod logout;
pub mod oidc;
pub mod types;

use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{IntoResponse, Redirect},
};

use crate::sso::SsoState;

/// Everything under `/` funnels to the login page.
pub async fn root(state: Extension<Arc<SsoState>>) -> impl IntoResponse {
    Redirect::to(state.config().login_path())
}
