use std::net::SocketAddr;

use anyhow::Context;
use deployment::Deployment;
use server::{DEFAULT_LOG_FILTER, DeploymentImpl, routes};
use services::services::config::Config;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::sentry::{init_once as sentry_init_once, sentry_layer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    sentry_init_once(config.sentry_dsn.as_deref());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(sentry_layer())
        .init();

    let addr = SocketAddr::new(config.host, config.port);
    let deployment = DeploymentImpl::new(config)
        .await
        .context("failed to initialize deployment")?;

    let app = routes::router(deployment).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
