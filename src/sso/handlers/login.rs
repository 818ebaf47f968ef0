//! The login endpoint, form and proxy flavours.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Extension, RawQuery},
    http::{
        header::{InvalidHeaderValue, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
    Form,
};
use tracing::error;

use super::types::{LoginForm, LoginPageResponse};
use crate::auth::{LoginMode, LoginRequest, Outcome, RateLimitScope};
use crate::sso::session::SESSION_COOKIE_NAME;
use crate::sso::SsoState;

/// Cookie carrying the signed remembered-device value.
pub(super) const DEVICE_COOKIE_NAME: &str = "rate_limit";

#[utoipa::path(
    get,
    path = "/sso/login",
    responses(
        (status = 200, description = "Login page parameters", body = LoginPageResponse),
        (status = 303, description = "Proxy-asserted identity accepted, redirecting"),
        (status = 500, description = "Proxy assertion rejected or backend unavailable")
    ),
    tag = "sso"
)]
pub async fn login_page(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    state: Extension<Arc<SsoState>>,
    RawQuery(query): RawQuery,
) -> Response {
    // A browser behind an authenticating proxy never posts the form; the
    // asserted identity is consumed on plain GET too.
    let request = build_login_request(&state, &headers, peer, query.as_deref(), None);
    if request.mode == LoginMode::Proxy {
        return proxy_login(&state, &headers, &request);
    }

    let oidc = state.orchestrator().oidc();
    let response = LoginPageResponse {
        admin_path: state.config().admin_path().to_string(),
        webmail_path: state.config().webmail_path().to_string(),
        oidc_enabled: oidc.is_enabled(),
        oidc_redirect_url: oidc.begin_login().map(|url| url.to_string()),
    };
    Json(response).into_response()
}

#[utoipa::path(
    post,
    path = "/sso/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Authenticated, redirecting to the destination"),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Wrong e-mail or password"),
        (status = 429, description = "Too many failed attempts"),
        (status = 500, description = "Authentication backend unavailable")
    ),
    tag = "sso"
)]
pub async fn login(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    state: Extension<Arc<SsoState>>,
    RawQuery(query): RawQuery,
    payload: Option<Form<LoginForm>>,
) -> Response {
    let form = payload.map(|Form(form)| form);
    let request = build_login_request(&state, &headers, peer, query.as_deref(), form.as_ref());
    // The proxy assertion wins before the form is even looked at.
    if request.mode == LoginMode::Proxy {
        return proxy_login(&state, &headers, &request);
    }
    if form.is_none() {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    }
    match state.orchestrator().login(&request) {
        Ok(outcome) => outcome_response(&state, &headers, outcome),
        Err(error) => {
            error!("Login decision failed: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication backend unavailable")
                .into_response()
        }
    }
}

fn proxy_login(state: &SsoState, headers: &HeaderMap, request: &LoginRequest) -> Response {
    match state.orchestrator().login(request) {
        Ok(outcome) => outcome_response(state, headers, outcome),
        Err(error) => {
            error!("Proxy login decision failed: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication backend unavailable")
                .into_response()
        }
    }
}

/// Reduce the raw HTTP request to one [`LoginRequest`].
pub(super) fn build_login_request(
    state: &SsoState,
    headers: &HeaderMap,
    peer: SocketAddr,
    query: Option<&str>,
    form: Option<&LoginForm>,
) -> LoginRequest {
    let proxy_identity = header_value(headers, state.config().proxy_auth_header());
    // `noproxyauth` lets an operator reach the password form even when the
    // proxy asserts an identity.
    let mode = if proxy_identity.is_some() && !query_flag(query, "noproxyauth") {
        LoginMode::Proxy
    } else {
        LoginMode::Form
    };

    let client_ip =
        header_value(headers, "x-real-ip").unwrap_or_else(|| peer.ip().to_string());
    let proxy_ip = header_value(headers, "x-forwarded-by")
        .and_then(|raw| raw.parse().ok())
        .or(Some(peer.ip()));

    let mut current_url = state.config().public_url().clone();
    current_url.set_path(state.config().login_path());
    current_url.set_query(query);

    LoginRequest {
        mode,
        client_ip,
        proxy_ip,
        username: form.and_then(|form| form.email.clone()),
        password: form.and_then(|form| form.pw.clone().map(Into::into)),
        proxy_identity,
        oidc_query: None,
        redirect_hint: query_param(query, "url"),
        device_cookie: cookie_value(headers, DEVICE_COOKIE_NAME),
        current_url,
        from_homepage: query_flag(query, "homepage"),
        admin_submit: form.is_some_and(|form| form.submit_admin.is_some()),
    }
}

/// Map a decision onto an HTTP response.
pub(super) fn outcome_response(
    state: &SsoState,
    headers: &HeaderMap,
    outcome: Outcome,
) -> Response {
    match outcome {
        Outcome::Authenticated {
            user,
            destination,
            device_cookie,
            oidc_token,
        } => {
            // Privilege changes, so the session identifier must too.
            let previous = cookie_value(headers, SESSION_COOKIE_NAME);
            let session_id = state
                .sessions()
                .regenerate_session_id(previous.as_deref());
            state.sessions().set_principal(&session_id, user);
            if let Some(token) = oidc_token {
                state.sessions().set_oidc_token(&session_id, token);
            }

            let mut response_headers = HeaderMap::new();
            if let Ok(cookie) = session_cookie(state, &session_id) {
                response_headers.append(SET_COOKIE, cookie);
            }
            if let Some(raw) = device_cookie {
                if let Ok(cookie) = rate_limit_cookie(state, &raw) {
                    response_headers.append(SET_COOKIE, cookie);
                }
            }
            if let Ok(location) = HeaderValue::from_str(&destination) {
                response_headers.insert(LOCATION, location);
            }
            (StatusCode::SEE_OTHER, response_headers).into_response()
        }
        Outcome::RateLimited {
            scope: RateLimitScope::Ip,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts from your IP (rate-limit)",
        )
            .into_response(),
        Outcome::RateLimited {
            scope: RateLimitScope::User,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts for this user (rate-limit)",
        )
            .into_response(),
        Outcome::InvalidCredentials | Outcome::UnknownIdentity => {
            (StatusCode::UNAUTHORIZED, "Wrong e-mail or password").into_response()
        }
        Outcome::OidcExchangeFailed => {
            (StatusCode::UNAUTHORIZED, "Single sign-on failed").into_response()
        }
        Outcome::ProxyNotWhitelisted => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "The proxy is not allowed to assert identities",
        )
            .into_response(),
        Outcome::ProxyHeaderMissing => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "The proxy did not assert an identity",
        )
            .into_response(),
        Outcome::DomainFull => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "The mail domain has no free slots",
        )
            .into_response(),
        Outcome::ProvisioningFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not provision the user",
        )
            .into_response(),
    }
}

fn session_cookie(state: &SsoState, session_id: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax");
    if state.config().session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// The device cookie is scoped to the login path so it is never sent to the
/// proxied applications.
fn rate_limit_cookie(state: &SsoState, value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = state.config().device_cookie_max_age();
    let path = state.config().login_path();
    let mut cookie = format!(
        "{DEVICE_COOKIE_NAME}={value}; Path={path}; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if state.config().session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub(super) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

pub(super) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub(super) fn query_flag(query: Option<&str>, name: &str) -> bool {
    query.is_some_and(|query| {
        url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_finds_the_named_pair() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; rate_limit=alice|sig; portone_session=abc"),
        );
        assert_eq!(
            cookie_value(&headers, "rate_limit").as_deref(),
            Some("alice|sig")
        );
        assert_eq!(
            cookie_value(&headers, "portone_session").as_deref(),
            Some("abc")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn query_helpers_parse_url_encoding() {
        let query = Some("url=%2Fadmin%2Fusers&homepage");
        assert_eq!(query_param(query, "url").as_deref(), Some("/admin/users"));
        assert!(query_flag(query, "homepage"));
        assert!(!query_flag(query, "noproxyauth"));
        assert_eq!(query_param(None, "url"), None);
    }
}
