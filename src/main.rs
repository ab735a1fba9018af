//! topichub server entry point.
//!
//! Starts the Axum HTTP server with the home page, health check and
//! WebSocket endpoint.

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use topichub::api;
use topichub::app_state::AppState;
use topichub::config::{HubConfig, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = HubConfig::from_env().context("loading configuration")?;

    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        ping_period = ?config.session.ping_period(),
        outbound_capacity = config.session.outbound_capacity,
        "starting topichub"
    );

    // One registry for the whole process
    let app_state = AppState::new(config.session);
    let app = api::build_app(app_state, config.http_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Initializes tracing with `RUST_LOG` (default `info`).
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
