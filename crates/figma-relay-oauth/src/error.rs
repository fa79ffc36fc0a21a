//! Error types for outbound calls to Figma.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while talking to the authorization server or the REST API.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Transport failure, including timeouts.
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status.
    #[error("Backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    /// Upstream answered 2xx but the body was not what we expected.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}

impl OAuthError {
    /// Build a [`OAuthError::Backend`] from a failed response, consuming its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        OAuthError::Backend { status, body }
    }
}
