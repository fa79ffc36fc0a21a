//! OAuth 2.0 authorization-code flow against Figma.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, Result};

/// Figma authorization page.
pub const FIGMA_AUTHORIZE_URL: &str = "https://www.figma.com/oauth";

/// Figma token endpoint.
pub const FIGMA_TOKEN_URL: &str = "https://www.figma.com/api/oauth/token";

/// Figma REST API base URL.
pub const FIGMA_API_URL: &str = "https://api.figma.com";

/// Scope requested on every authorization.
pub const DEFAULT_SCOPE: &str = "file_read";

/// Upstream URLs the relay talks to.
///
/// These are fixed third-party addresses in production; the type exists so
/// tests can point the relay at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigmaEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
}

impl Default for FigmaEndpoints {
    fn default() -> Self {
        Self::figma()
    }
}

impl FigmaEndpoints {
    /// The public Figma endpoints.
    pub fn figma() -> Self {
        Self {
            authorize_url: FIGMA_AUTHORIZE_URL.to_string(),
            token_url: FIGMA_TOKEN_URL.to_string(),
            api_base_url: FIGMA_API_URL.to_string(),
        }
    }

    /// Serve every endpoint from one base URL, using Figma's paths.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/oauth", base),
            token_url: format!("{}/api/oauth/token", base),
            api_base_url: base.to_string(),
        }
    }
}

/// OAuth client configuration, built once at startup.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub endpoints: FigmaEndpoints,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl OAuthConfig {
    /// Create a config for the public Figma endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scope: DEFAULT_SCOPE.to_string(),
            endpoints: FigmaEndpoints::default(),
        }
    }

    /// Override the upstream endpoints.
    pub fn with_endpoints(mut self, endpoints: FigmaEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Reject blank credentials before the server starts.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OAuthError::Config(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Generate a random state string for the authorization request.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Build the authorization URL the browser is redirected to.
pub fn build_authorization_url(config: &OAuthConfig, state: &str) -> String {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", config.scope.as_str()),
        ("state", state),
        ("response_type", "code"),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.endpoints.authorize_url, query)
}

/// Token endpoint response. Only `access_token` is used by the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user_id_string: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    code: &'a str,
    grant_type: &'static str,
}

/// Exchange an authorization code for an access token.
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenResponse> {
    let form = TokenExchangeRequest {
        client_id: &config.client_id,
        client_secret: &config.client_secret,
        redirect_uri: &config.redirect_uri,
        code,
        grant_type: "authorization_code",
    };

    let response = client
        .post(&config.endpoints.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| OAuthError::Network(format!("Token exchange request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(OAuthError::from_response(response).await);
    }

    let body = response
        .text()
        .await
        .map_err(|e| OAuthError::Network(format!("Failed to read token response: {}", e)))?;

    let tokens: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        OAuthError::InvalidResponse(format!("Failed to parse token response: {}", e))
    })?;

    if tokens.access_token.is_empty() {
        return Err(OAuthError::InvalidResponse(
            "Token response contained an empty access_token".to_string(),
        ));
    }

    tracing::debug!(
        user_id = tokens.user_id_string.as_deref().unwrap_or("unknown"),
        expires_in = tokens.expires_in,
        has_refresh_token = tokens.refresh_token.is_some(),
        "Exchanged authorization code for access token"
    );

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "client-123",
            "secret-456",
            "http://localhost:3000/api/callback",
        )
    }

    #[test]
    fn test_state_generation() {
        let state1 = generate_state();
        let state2 = generate_state();
        assert!(!state1.is_empty());
        assert_ne!(state1, state2);
        // 32 bytes of URL-safe base64 without padding
        assert_eq!(state1.len(), 43);
        assert!(!state1.contains('='));
    }

    #[test]
    fn test_authorization_url() {
        let url = build_authorization_url(&test_config(), "test_state");

        assert!(url.starts_with("https://www.figma.com/oauth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fcallback"));
        assert!(url.contains("scope=file_read"));
        assert!(url.contains("state=test_state"));
        assert!(url.ends_with("response_type=code"));
    }

    #[test]
    fn test_authorization_url_uses_endpoint_override() {
        let config =
            test_config().with_endpoints(FigmaEndpoints::with_base_url("http://127.0.0.1:9999/"));
        let url = build_authorization_url(&config, "s");
        assert!(url.starts_with("http://127.0.0.1:9999/oauth?client_id="));
    }

    #[test]
    fn test_endpoints_default_is_figma() {
        let endpoints = FigmaEndpoints::default();
        assert_eq!(endpoints.authorize_url, "https://www.figma.com/oauth");
        assert_eq!(endpoints.token_url, "https://www.figma.com/api/oauth/token");
        assert_eq!(endpoints.api_base_url, "https://api.figma.com");
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(test_config().validate().is_ok());

        let mut config = test_config();
        config.client_secret = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("client_secret"));

        let mut config = test_config();
        config.redirect_uri.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", test_config());
        assert!(rendered.contains("client-123"));
        assert!(!rendered.contains("secret-456"));
    }

    #[test]
    fn test_token_response_optional_fields() {
        let tokens: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(tokens.access_token, "abc");
        assert!(tokens.refresh_token.is_none());

        let tokens: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","refresh_token":"r","expires_in":7776000,"user_id_string":"42"}"#,
        )
        .unwrap();
        assert_eq!(tokens.expires_in, Some(7776000));
        assert_eq!(tokens.user_id_string.as_deref(), Some("42"));
    }
}
