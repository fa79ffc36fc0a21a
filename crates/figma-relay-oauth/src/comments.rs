//! Client for the Figma comments endpoint.
//!
//! Forwards the caller's access token as a bearer credential and hands back
//! the upstream body untouched. Nothing is cached; every call goes upstream.

use axum::body::Bytes;
use reqwest::{Client, header};

use crate::error::{OAuthError, Result};

/// Fetches file comments from the Figma REST API.
#[derive(Debug, Clone)]
pub struct CommentsClient {
    client: Client,
    api_base_url: String,
}

impl CommentsClient {
    /// Create a client that talks to `api_base_url` (for example `https://api.figma.com`).
    pub fn new(client: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the comments collection for `file_key`.
    pub fn comments_url(&self, file_key: &str) -> String {
        format!(
            "{}/v1/files/{}/comments",
            self.api_base_url,
            urlencoding::encode(file_key)
        )
    }

    /// Fetch the raw JSON comments body for `file_key`.
    pub async fn fetch(&self, access_token: &str, file_key: &str) -> Result<Bytes> {
        let url = self.comments_url(file_key);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| OAuthError::Network(format!("Comments request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(OAuthError::from_response(response).await);
        }

        response
            .bytes()
            .await
            .map_err(|e| OAuthError::Network(format!("Failed to read comments response: {}", e)))
    }
}
