//! Connectivity check

use anyhow::{Context, Result};
use clap::Parser;
use geoctl_core::DataLayer;

use super::db_config;

#[derive(Parser, Debug)]
pub struct PingArgs {}

pub async fn run_ping(_args: PingArgs) -> Result<()> {
    let db = db_config()?;
    let data = DataLayer::mongo(&db);

    data.ready()
        .await
        .with_context(|| format!("Database at {} is not reachable", db.redacted_uri()))?;
    data.shutdown().await;

    println!("ok: {} (database {})", db.redacted_uri(), db.db_name);
    Ok(())
}
