//! HTTP server for the Figma OAuth relay.
//!
//! Three routes carry the flow: `/api/login` redirects to Figma,
//! `/api/callback` trades the code for a token and stores it in a cookie,
//! and `/api/comments` uses that cookie to fetch a file's comments.

use axum::{
    Json, Router as AxumRouter,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::comments::CommentsClient;
use crate::error::OAuthError;
use crate::oauth::{OAuthConfig, build_authorization_url, exchange_code_for_token, generate_state};

/// Name of the cookie holding the Figma access token.
pub const TOKEN_COOKIE: &str = "figma_token";

/// Lifetime of the token cookie.
pub const TOKEN_COOKIE_MAX_AGE: time::Duration = time::Duration::hours(1);

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default timeout applied to every outbound call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Body returned after a successful login.
pub const LOGIN_SUCCESS_MESSAGE: &str =
    "✅ Login successful! You can now close this tab and return to the plugin.";

/// Configuration for the relay server.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    pub oauth: OAuthConfig,
    pub upstream_timeout: Duration,
}

impl ProxyConfig {
    pub fn new(oauth: OAuthConfig) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            oauth,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }
}

/// Shared, read-only state for the handlers.
struct ProxyState {
    oauth: OAuthConfig,
    http: reqwest::Client,
    comments: CommentsClient,
}

/// The relay server.
pub struct ProxyServer {
    config: ProxyConfig,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Validate the configuration and build the shared HTTP client.
    pub fn new(config: ProxyConfig) -> crate::Result<Self> {
        config.oauth.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(concat!("figma-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OAuthError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let comments = CommentsClient::new(http.clone(), &config.oauth.endpoints.api_base_url);

        Ok(Self {
            state: Arc::new(ProxyState {
                oauth: config.oauth.clone(),
                http,
                comments,
            }),
            config,
        })
    }

    /// Build the axum router.
    pub fn router(&self) -> AxumRouter {
        AxumRouter::new()
            .route("/api/login", get(handle_login))
            .route("/api/callback", get(handle_callback))
            .route("/api/comments", get(handle_comments))
            .route("/health", get(handle_health))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Server running at http://{}", local_addr);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Run in a background task, returning the bound address.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Starting Figma relay");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, self.router())
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "Figma relay stopped with an error");
            }
        });
        Ok(local_addr)
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentsParams {
    file_key: Option<String>,
}

/// Handle GET /api/login
async fn handle_login(State(state): State<Arc<ProxyState>>) -> Response {
    let oauth_state = generate_state();
    let url = build_authorization_url(&state.oauth, &oauth_state);
    tracing::debug!("Redirecting to Figma authorization page");
    (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
}

/// Handle GET /api/callback
async fn handle_callback(
    State(state): State<Arc<ProxyState>>,
    query: Result<Query<CallbackParams>, QueryRejection>,
    jar: CookieJar,
) -> Result<(CookieJar, &'static str), RelayError> {
    let Query(params) = query.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable callback query");
        RelayError::MissingCode
    })?;

    if let Some(error) = params.error.as_deref() {
        tracing::warn!(error, "Authorization server reported an error");
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(RelayError::MissingCode)?;

    // The state issued by /api/login is not retained, so it cannot be checked here.
    if params.state.is_some() {
        tracing::debug!("Callback carried a state parameter; not verified");
    }

    let tokens = exchange_code_for_token(&state.http, &state.oauth, &code)
        .await
        .map_err(RelayError::TokenExchangeFailed)?;

    Ok((jar.add(token_cookie(tokens.access_token)), LOGIN_SUCCESS_MESSAGE))
}

/// Handle GET /api/comments
async fn handle_comments(
    State(state): State<Arc<ProxyState>>,
    jar: CookieJar,
    query: Result<Query<CommentsParams>, QueryRejection>,
) -> Result<Response, RelayError> {
    let token = jar
        .get(TOKEN_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .ok_or(RelayError::Unauthenticated)?;

    // An unreadable query (e.g. a repeated file_key) only matters once the caller is logged in.
    let Query(params) = query.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable comments query");
        RelayError::MissingFileKey
    })?;

    let file_key = params
        .file_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or(RelayError::MissingFileKey)?;

    let body = state
        .comments
        .fetch(token, file_key)
        .await
        .map_err(RelayError::UpstreamFetchFailed)?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Handle GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "figma-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn token_cookie(access_token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, access_token))
        .http_only(true)
        .path("/")
        .max_age(TOKEN_COOKIE_MAX_AGE)
        .build()
}

/// Request-level failures. Upstream detail is logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Missing code from Figma")]
    MissingCode,

    #[error("Missing file_key parameter")]
    MissingFileKey,

    #[error("Not logged in. Please log in via /api/login")]
    Unauthenticated,

    #[error("Failed to exchange code for token.")]
    TokenExchangeFailed(#[source] OAuthError),

    #[error("Failed to fetch comments from Figma.")]
    UpstreamFetchFailed(#[source] OAuthError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingCode | RelayError::MissingFileKey => StatusCode::BAD_REQUEST,
            RelayError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RelayError::TokenExchangeFailed(_) | RelayError::UpstreamFetchFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            RelayError::TokenExchangeFailed(source) => {
                tracing::error!(status = %status, error = %source, "Error getting token");
            }
            RelayError::UpstreamFetchFailed(source) => {
                tracing::error!(status = %status, error = %source, "Error fetching comments");
            }
            _ => {
                tracing::warn!(status = %status, error = %self, "Client error");
            }
        }

        (status, self.to_string()).into_response()
    }
}
