//! Deploy receiver entry point.
//!
//! Initialises tracing, loads configuration from `HAKO_DEPLOY_*`
//! environment variables (refusing to start without an API key) and
//! serves the artifact endpoint until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use deploy_server::artifact::ArtifactKind;
use deploy_server::server::{self, ARTIFACT_ENDPOINT};
use deploy_server::{AppState, ArtifactTable, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialise tracing with RUST_LOG env filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("deploy-server starting");

    // 2. Load configuration from HAKO_DEPLOY_* env vars.
    let config = Config::from_env()
        .context("failed to load config (HAKO_DEPLOY_API_KEY is required)")?;

    let artifacts = ArtifactTable::standard();
    tracing::info!(
        listen_addr = %config.listen_addr,
        max_upload_bytes = config.max_upload_bytes,
        "configuration loaded",
    );
    for kind in ArtifactKind::ALL {
        let spec = artifacts.spec(kind);
        tracing::info!(
            artifact = %kind,
            staging_dir = %spec.staging_dir.display(),
            deploy_dir = %spec.deploy_dir.display(),
            "artifact registered",
        );
    }

    // 3. Build state and router.
    let state = Arc::new(AppState::new(&config, artifacts));
    let router = server::router(state);

    // 4. Bind and serve.
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        "deploy endpoint ready — http://{}{}",
        config.listen_addr,
        ARTIFACT_ENDPOINT,
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("deploy-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl-C handler");
    tracing::info!("received shutdown signal");
}
