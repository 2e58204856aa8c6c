//! HTTP server command

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use geoctl_server::{run_server, ServerConfig};

use super::{data_layer, db_config};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "GEOCTL_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Serve from an in-memory store instead of MongoDB
    #[arg(long)]
    pub in_memory: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let db = db_config()?;
    let data = data_layer(&db, args.in_memory);

    // A database that is down at startup is reported by /readyz and
    // reconnected on the first request
    if let Err(err) = data.start().await {
        tracing::warn!(error = %err, "Database not available at startup");
    }

    tracing::info!("Starting geoctl server on {}", args.bind);

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    // Blocks until shutdown
    run_server(data, config).await.context("Server error")?;

    Ok(())
}
