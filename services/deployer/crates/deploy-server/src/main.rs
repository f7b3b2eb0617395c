//! Deployer entry point.
//!
//! Initialises tracing, loads server settings from `DEPLOYER_*` variables,
//! and serves the provisioning endpoint until SIGINT or SIGTERM.
//! Provisioning values themselves are read from the environment on every
//! request.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use fuel_deploy_common::ServerConfig;
use fuel_deploy_server::{AppState, GceComputeClient, ProcessEnv, router, shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialise tracing with RUST_LOG env filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("deploy-instance starting");

    // 2. Load server settings.
    let config = ServerConfig::from_env()
        .context("failed to load config from DEPLOYER_* / PORT env vars")?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        compute_endpoint = %config.compute_endpoint,
        submit_timeout_secs = config.submit_timeout_secs,
        static_token = config.access_token.is_some(),
        "configuration loaded",
    );

    // 3. Outbound client, shared read-only by every invocation.
    let compute =
        GceComputeClient::from_config(&config).context("failed to build compute client")?;
    let state = AppState::new(Arc::new(compute), Arc::new(ProcessEnv));

    // 4. Bind and serve.
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!("deployer ready — http://{}/", config.listen_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("deploy-instance shut down");
    Ok(())
}
