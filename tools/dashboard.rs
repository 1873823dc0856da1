//! Fraud Dashboard API - Entry Point
//!
//! Loads the stored model, scores the transaction dataset once and serves
//! the dashboard views over HTTP.

use anyhow::{Context, Result};
use fraud_model_pipeline::{
    config::AppConfig,
    logging,
    serving::{create_router, ServingContext},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    info!("Starting fraud dashboard");
    info!(
        csv = %config.data.csv_path.display(),
        artifacts = %config.artifacts.dir.display(),
        "Configuration loaded"
    );

    let ctx = ServingContext::build(&config).context("Failed to prepare dashboard data")?;
    let app = create_router(Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind(&config.serving.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.serving.bind_addr))?;
    info!("Dashboard listening on http://{}", config.serving.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Dashboard shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
