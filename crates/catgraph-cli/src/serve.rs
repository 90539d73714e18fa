//! # Serve Subcommand
//!
//! Runs the gateway until Ctrl-C. Startup order:
//!
//! 1. Read `GatewayConfig` from the environment and apply flag overrides.
//! 2. Bootstrap application state. A policy error exits with code 2 before
//!    the listener is bound.
//! 3. Start the limiter's idle sweeper.
//! 4. Bind and serve with graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use catgraph_api::bootstrap::{bootstrap, BootstrapError};
use catgraph_api::config::GatewayConfig;

use crate::EXIT_CONFIGURATION;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides PORT).
    #[arg(long)]
    pub port: Option<u16>,

    /// Policy document (overrides POLICY_FILE).
    #[arg(long, value_name = "PATH")]
    pub policy: Option<PathBuf>,

    /// Identity service base URL (overrides AUTH_URL).
    #[arg(long)]
    pub auth_url: Option<String>,

    /// Identity lookup timeout in milliseconds (overrides IDENTITY_TIMEOUT_MS).
    #[arg(long)]
    pub identity_timeout_ms: Option<u64>,

    /// Keep cats in memory even if DATABASE_URL is set.
    #[arg(long)]
    pub in_memory: bool,
}

impl ServeArgs {
    /// Apply flag overrides on top of `config`.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(policy) = &self.policy {
            config.policy_file = Some(policy.clone());
        }
        if let Some(url) = &self.auth_url {
            config.auth_url = Some(url.clone());
        }
        if let Some(ms) = self.identity_timeout_ms {
            config.identity_timeout = Duration::from_millis(ms);
        }
        if self.in_memory {
            config.database_url = None;
        }
    }
}

/// Execute the serve subcommand.
pub async fn run_serve(args: &ServeArgs) -> Result<u8> {
    let mut config = GatewayConfig::from_env();
    args.apply(&mut config);
    tracing::debug!(?config, "gateway configuration");

    let state = match bootstrap(&config).await {
        Ok(state) => state,
        Err(BootstrapError::Policy(e)) => {
            tracing::error!(error = %e, "invalid policy configuration, refusing to serve");
            return Ok(EXIT_CONFIGURATION);
        }
        Err(e) => return Err(e).context("gateway bootstrap failed"),
    };

    let sweeper = state.gate.limiter().spawn_sweeper(config.limiter_sweep);
    let app = catgraph_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "catgraph gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    tracing::info!("catgraph gateway stopped");
    Ok(0)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
