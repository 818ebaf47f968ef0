//! Logout endpoint: drops the session and clears application cookies.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};

use super::login::cookie_value;
use crate::sso::session::SESSION_COOKIE_NAME;
use crate::sso::SsoState;

// Cookies set by the proxied applications; cleared so a shared browser does
// not keep a webmail session alive after logout.
const APPLICATION_COOKIES: [&str; 3] = ["roundcube_sessauth", "roundcube_sessid", "smsession"];

#[utoipa::path(
    get,
    path = "/sso/logout",
    responses(
        (status = 303, description = "Session cleared, redirecting to the login page")
    ),
    tag = "sso"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<SsoState>>) -> Response {
    if let Some(session_id) = cookie_value(&headers, SESSION_COOKIE_NAME) {
        state.sessions().destroy(&session_id);
    }

    // Always clear the cookies, even when no session record existed.
    let mut response_headers = HeaderMap::new();
    let secure = state.config().session_cookie_secure();
    if let Ok(cookie) = clear_cookie(SESSION_COOKIE_NAME, secure) {
        response_headers.append(SET_COOKIE, cookie);
    }
    for name in APPLICATION_COOKIES {
        if let Ok(cookie) = clear_cookie(name, secure) {
            response_headers.append(SET_COOKIE, cookie);
        }
    }

    let destination = state
        .config()
        .proxy_auth_logout_url()
        .unwrap_or_else(|| state.config().login_path());
    if let Ok(location) = HeaderValue::from_str(destination) {
        response_headers.insert(LOCATION, location);
    }
    (StatusCode::SEE_OTHER, response_headers).into_response()
}

fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
