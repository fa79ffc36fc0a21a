//! Figma OAuth relay
//!
//! Main entry point: reads configuration from the environment (and `.env`),
//! sets up logging, and serves the relay until interrupted.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use figma_relay_oauth::{OAuthConfig, ProxyConfig, ProxyServer};

const CONSOLE_FILTER: &str = "figma_relay=info,figma_relay_oauth=info,tower_http=info,warn";
const VERBOSE_FILTER: &str = "figma_relay=debug,figma_relay_oauth=debug,tower_http=debug,info";
const FILE_FILTER: &str = "figma_relay=trace,figma_relay_oauth=trace,tower_http=debug,info";

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Relay Figma's OAuth flow and comments API for a browser client
#[derive(Parser, Debug)]
#[command(name = "figma-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Figma OAuth client ID
    #[arg(long, env = "FIGMA_CLIENT_ID")]
    pub client_id: String,

    /// Figma OAuth client secret
    #[arg(long, env = "FIGMA_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Redirect URI registered with Figma (points at /api/callback)
    #[arg(long, env = "REDIRECT_URI")]
    pub redirect_uri: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = figma_relay_oauth::proxy::DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "RELAY_BIND_HOST", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Timeout for calls to Figma, in seconds
    #[arg(long, env = "RELAY_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout: u64,

    /// Directory for daily-rotated JSON logs (console only when unset)
    #[arg(long, env = "RELAY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    fn proxy_config(&self) -> ProxyConfig {
        let oauth = OAuthConfig::new(&self.client_id, &self.client_secret, &self.redirect_uri);
        ProxyConfig::new(oauth)
            .with_bind_addr(SocketAddr::new(self.bind, self.port))
            .with_upstream_timeout(Duration::from_secs(self.upstream_timeout))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.log_dir.as_deref())?;

    let server = ProxyServer::new(cli.proxy_config()).context("Invalid relay configuration")?;

    server
        .run_until(shutdown_signal())
        .await
        .context("Relay server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Console (human-readable) logging, plus a rotating JSON file when `log_dir` is set.
///
/// The returned guard flushes the file writer on drop and must outlive the server.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { CONSOLE_FILTER })
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "figma-relay.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
