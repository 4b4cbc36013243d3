mod config;

use std::sync::Arc;

use anyhow::Context;
use atc24_server::Hub;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,atc24_server=debug,atc24_web=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ATC24 hub starting...");

    let config = AppConfig::from_env().context("load configuration")?;
    let hub = Arc::new(
        Hub::with_http_upstream(config.hub.clone()).context("build upstream client")?,
    );

    // Poller, relay and heartbeat
    let mut tasks = hub.spawn_background();

    let app = atc24_web::create_router(hub.clone(), config.static_dir.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!("ATC24 hub ready on http://{}", config.bind_addr);
    tracing::info!("   Upstream:  {}", config.hub.upstream_url);
    tracing::info!("   Stream:    {}", config.hub.stream_url);
    match &config.static_dir {
        Some(dir) => tracing::info!("   Static:    {}", dir.display()),
        None => tracing::info!("   Static:    disabled"),
    }

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = &mut tasks.poller => {
            tracing::warn!("REST poller stopped");
        }
        _ = &mut tasks.relay => {
            tracing::warn!("Stream relay stopped");
        }
        _ = &mut tasks.heartbeat => {
            tracing::warn!("Heartbeat stopped");
        }
    }

    tasks.abort_all();
    tracing::info!("Shutdown complete");
    Ok(())
}
