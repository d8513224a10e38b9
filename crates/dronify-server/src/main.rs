//! # dronify-server
//!
//! HTTP server for the dronify drone-delivery operator.
//!
//! This binary provides:
//! - REST API for contacts, drones, packages and flights
//! - OpenAPI document at `/api/openapi.json`
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package dronify-server
//!
//! # With an explicit configuration file
//! DRONIFY_CONFIG=./dronify.toml ./dronify-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use anyhow::Context;
use dronify_core::{default_config_path, DronifyConfig};
use dronify_server::api;
use dronify_server::logging;
use dronify_server::state::AppState;
use tokio::net::TcpListener;
use tracing::info;

/// Environment variable overriding the configuration file location.
const CONFIG_PATH_ENV: &str = "DRONIFY_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(default_config_path, PathBuf::from);
    let config = DronifyConfig::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    logging::init(&config.server)?;

    info!(
        config = %config_path.display(),
        timezone = %config.system.timezone,
        "Starting dronify-server"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config)?.shared();
    let app = api::create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
