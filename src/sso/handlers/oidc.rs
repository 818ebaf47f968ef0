//! OIDC entry and callback endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Extension, RawQuery},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use tracing::error;

use super::login::{build_login_request, outcome_response, query_param};
use crate::auth::LoginMode;
use crate::sso::SsoState;

#[utoipa::path(
    get,
    path = "/sso/login/oidc",
    responses(
        (status = 303, description = "Redirect to the provider or to the destination"),
        (status = 401, description = "Single sign-on failed"),
        (status = 429, description = "Too many failed attempts")
    ),
    tag = "sso"
)]
pub async fn login_oidc(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    state: Extension<Arc<SsoState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let oidc = state.orchestrator().oidc();
    if !oidc.is_enabled() {
        return Redirect::to(state.config().login_path()).into_response();
    }

    // The provider calls back with `code`; anything else starts the flow.
    if query_param(query.as_deref(), "code").is_some() {
        let mut request = build_login_request(&state, &headers, peer, query.as_deref(), None);
        request.mode = LoginMode::OidcCallback;
        request.oidc_query = query;
        return match state.orchestrator().login(&request) {
            Ok(outcome) => outcome_response(&state, &headers, outcome),
            Err(error) => {
                error!("OIDC login decision failed: {error}");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication backend unavailable",
                )
                    .into_response()
            }
        };
    }

    match oidc.begin_login() {
        Some(url) => Redirect::to(url.as_str()).into_response(),
        None => Redirect::to(state.config().login_path()).into_response(),
    }
}
