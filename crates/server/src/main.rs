//! edgeside server entry point.
//!
//! Boots the ESI edge proxy: loads configuration, builds the route table, the
//! in-memory cache and the HTTP client, then serves until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use edgeside_client::{FetchClient, FetchConfig};
use edgeside_core::{AppConfig, Edge, EdgeOptions, MemoryStore, RouteTable};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = AppConfig::load()?;
    let routes = RouteTable::from_config(&config.routes)?;
    let route_count = routes.len();

    let store = Arc::new(MemoryStore::new(config.cache_capacity));
    let client = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let edge = Edge::new(store.clone(), Arc::new(routes), client.clone(), client, EdgeOptions::from(&config));

    tokio::spawn(sweep(store, config.sweep_interval()));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        addr = %config.listen_addr,
        routes = route_count,
        cache_capacity = config.cache_capacity,
        "Starting edgeside"
    );

    axum::serve(listener, handler::router(edge))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("edgeside stopped");
    Ok(())
}

/// Periodically drop expired cache entries.
async fn sweep(store: Arc<MemoryStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let purged = store.purge_expired().await;
        if purged > 0 {
            tracing::debug!(purged, "swept expired cache entries");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
