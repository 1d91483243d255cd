// ABOUTME: Server binary: loads configuration, bootstraps the signing key, and serves the HTTP API
// ABOUTME: Shuts down gracefully on Ctrl-C
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # User Auth Server Binary
//!
//! Starts the authorization server with storage and the signing key loaded
//! from the environment.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use user_auth_server::{
    config::{DatabaseUrl, ServerConfig},
    logging,
    resources::ServerResources,
    routes,
};

#[derive(Parser)]
#[command(name = "user-auth-server")]
#[command(about = "OAuth2-style authorization server issuing ES256 tokens")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override storage URL (`memory`, `sqlite::memory:`, or a SQLite path)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database = DatabaseUrl::parse_url(&database_url);
    }
    config.validate()?;

    info!("Starting user auth server");
    info!("{}", config.summary());

    let address = format!("{}:{}", config.host, config.http_port);
    let resources = ServerResources::bootstrap(config)
        .await
        .context("Failed to initialize server resources")?;
    info!(
        key_id = %resources.signing_key.key_id(),
        "Signing key ready"
    );

    let app = routes::router(Arc::new(resources));
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
