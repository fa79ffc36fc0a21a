//! OAuth 2.0 relay for the Figma REST API.
//!
//! Sends the browser through Figma's authorization-code flow, keeps the
//! resulting access token in an HTTP-only cookie, and proxies file comment
//! lookups using that token as a bearer credential. The server holds no
//! per-user state between requests.
//!
//! # Components
//!
//! - [`oauth`] - client configuration, state generation, authorization URL, code exchange
//! - [`comments`] - bearer-authenticated fetch of a file's comments
//! - [`proxy`] - Axum router, request handlers and server lifecycle

pub mod comments;
pub mod error;
pub mod oauth;
pub mod proxy;

pub use comments::CommentsClient;
pub use error::{OAuthError, Result};
pub use oauth::{FigmaEndpoints, OAuthConfig, TokenResponse};
pub use proxy::{ProxyConfig, ProxyServer, RelayError};
