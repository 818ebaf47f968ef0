//! HTTP surface of the front-door.

pub mod handlers;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
    Extension, Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::auth::{AuthConfig, LoginOrchestrator};
use session::SessionStore;

pub struct SsoState {
    orchestrator: LoginOrchestrator,
    sessions: Arc<dyn SessionStore>,
    config: AuthConfig,
}

impl SsoState {
    #[must_use]
    pub fn new(
        orchestrator: LoginOrchestrator,
        sessions: Arc<dyn SessionStore>,
        config: AuthConfig,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            config,
        }
    }

    #[must_use]
    pub fn orchestrator(&self) -> &LoginOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<SsoState>) -> Result<()> {
    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health::health))
        .route(
            "/sso/login",
            get(handlers::login::login_page).post(handlers::login::login),
        )
        .route("/sso/login/oidc", get(handlers::oidc::login_oidc))
        .route("/sso/logout", get(handlers::logout::logout))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::CredentialAuthenticator;
    use crate::auth::device_cookie::DeviceCookieCodec;
    use crate::auth::oidc::OidcAuthenticator;
    use crate::auth::proxy::ProxyAuthenticator;
    use crate::auth::store::{
        DisabledOidc, LogNotifier, MemoryUserStore, TracingAuditLog, UserStore,
    };
    use crate::auth::{
        Domain, MemoryCounterStore, RateLimiter, User,
    };
    use crate::sso::session::{MemorySessionStore, SESSION_COOKIE_NAME};
    use axum::extract::{ConnectInfo, Extension, RawQuery};
    use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::Form;
    use ipnetwork::IpNetwork;
    use secrecy::SecretString;
    use std::net::SocketAddr;
    use std::str::FromStr;
    use url::Url;

    fn state() -> anyhow::Result<Arc<SsoState>> {
        state_with_whitelist(Vec::new())
    }

    fn state_with_whitelist(whitelist: Vec<IpNetwork>) -> anyhow::Result<Arc<SsoState>> {
        let config = AuthConfig::new(
            Url::parse("https://mail.example")?,
            &SecretString::from("test-secret".to_string()),
        );
        let users = Arc::new(MemoryUserStore::new());
        users.add_domain(Domain {
            name: "example.com".to_string(),
            max_users: -1,
        });
        users.add_user(
            User {
                localpart: "alice".to_string(),
                domain: "example.com".to_string(),
                displayed_name: "Alice".to_string(),
                app_token_capable: false,
            },
            "hunter2",
        );
        let users: Arc<dyn UserStore> = users;
        let audit = Arc::new(TracingAuditLog);
        let rate_limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryCounterStore::new()),
            config.rate_limits(),
            DeviceCookieCodec::new(config.device_cookie_key()),
        ));
        let orchestrator = LoginOrchestrator::new(
            config.clone(),
            rate_limiter.clone(),
            CredentialAuthenticator::new(users.clone()),
            ProxyAuthenticator::new(
                users.clone(),
                Arc::new(LogNotifier),
                audit.clone(),
                whitelist,
                false,
            ),
            OidcAuthenticator::new(Arc::new(DisabledOidc), users, rate_limiter, audit.clone()),
            audit,
        );
        Ok(Arc::new(SsoState::new(
            orchestrator,
            Arc::new(MemorySessionStore::new()),
            config,
        )))
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from_str("192.0.2.7:54321").unwrap())
    }

    fn form(email: &str, password: &str) -> Form<handlers::types::LoginForm> {
        Form(handlers::types::LoginForm {
            email: Some(email.to_string()),
            pw: Some(password.to_string()),
            submit_admin: None,
            submit_webmail: None,
        })
    }

    #[tokio::test]
    async fn successful_login_sets_cookies_and_redirects() -> anyhow::Result<()> {
        let state = state()?;
        let response = handlers::login::login(
            HeaderMap::new(),
            peer(),
            Extension(state.clone()),
            RawQuery(None),
            Some(form("alice@example.com", "hunter2")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).map(|v| v.to_str().ok()),
            Some(Some("/webmail"))
        );
        let cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert!(cookies
            .iter()
            .any(|cookie| cookie.starts_with(&format!("{SESSION_COOKIE_NAME}="))));
        assert!(cookies
            .iter()
            .any(|cookie| cookie.starts_with("rate_limit=") && cookie.contains("Path=/sso/login")));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() -> anyhow::Result<()> {
        let state = state()?;
        let response = handlers::login::login(
            HeaderMap::new(),
            peer(),
            Extension(state),
            RawQuery(None),
            Some(form("alice@example.com", "wrong")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn missing_payload_is_a_bad_request() -> anyhow::Result<()> {
        let state = state()?;
        let response = handlers::login::login(
            HeaderMap::new(),
            peer(),
            Extension(state),
            RawQuery(None),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_page_consumes_a_proxy_asserted_identity_on_get() -> anyhow::Result<()> {
        let state = state_with_whitelist(vec![IpNetwork::from_str("10.0.0.0/8")?])?;
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-email", HeaderValue::from_static("alice@example.com"));
        headers.insert("x-forwarded-by", HeaderValue::from_static("10.0.0.5"));

        let response = handlers::login::login_page(
            headers,
            peer(),
            Extension(state.clone()),
            RawQuery(None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).map(|v| v.to_str().ok()),
            Some(Some("/admin"))
        );
        let cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert!(cookies
            .iter()
            .any(|cookie| cookie.starts_with(&format!("{SESSION_COOKIE_NAME}="))));
        Ok(())
    }

    #[tokio::test]
    async fn login_page_without_a_proxy_header_returns_parameters() -> anyhow::Result<()> {
        let state = state_with_whitelist(vec![IpNetwork::from_str("10.0.0.0/8")?])?;
        let response = handlers::login::login_page(
            HeaderMap::new(),
            peer(),
            Extension(state),
            RawQuery(None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn proxy_assertion_wins_over_a_payload_less_post() -> anyhow::Result<()> {
        let state = state_with_whitelist(vec![IpNetwork::from_str("10.0.0.0/8")?])?;
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-email", HeaderValue::from_static("alice@example.com"));
        headers.insert("x-forwarded-by", HeaderValue::from_static("10.0.0.5"));

        let response = handlers::login::login(
            headers,
            peer(),
            Extension(state),
            RawQuery(None),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).map(|v| v.to_str().ok()),
            Some(Some("/admin"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn logout_destroys_the_session_and_clears_cookies() -> anyhow::Result<()> {
        let state = state()?;
        let session_id = state.sessions().regenerate_session_id(None);
        state.sessions().set_principal(
            &session_id,
            User {
                localpart: "alice".to_string(),
                domain: "example.com".to_string(),
                displayed_name: "Alice".to_string(),
                app_token_capable: false,
            },
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("{SESSION_COOKIE_NAME}={session_id}").parse()?,
        );
        let response = handlers::logout::logout(headers, Extension(state.clone())).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).map(|v| v.to_str().ok()),
            Some(Some("/sso/login"))
        );
        assert!(state.sessions().principal(&session_id).is_none());
        let cleared: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert!(cleared.iter().all(|cookie| cookie.contains("Max-Age=0")));
        assert!(cleared
            .iter()
            .any(|cookie| cookie.starts_with("roundcube_sessauth=")));
        Ok(())
    }

    #[tokio::test]
    async fn oidc_endpoint_redirects_to_login_when_disabled() -> anyhow::Result<()> {
        let state = state()?;
        let response = handlers::oidc::login_oidc(
            HeaderMap::new(),
            peer(),
            Extension(state),
            RawQuery(None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).map(|v| v.to_str().ok()),
            Some(Some("/sso/login"))
        );
        Ok(())
    }
}
