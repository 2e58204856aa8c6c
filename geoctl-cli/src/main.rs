//! geoctl CLI - countries, states and cities over MongoDB
//!
//! Entry point for the `geoctl` binary:
//! - `serve` runs the HTTP API
//! - `seed` loads JSON backups through the repositories
//! - `ping` checks that the configured database answers

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "geoctl",
    author,
    version,
    about = "Geographic CRUD API (countries, states, cities) backed by MongoDB",
    long_about = "Serve, seed and check a MongoDB-backed geographic API. The database is \
                  chosen from MONGO_URI, or CLOUD_MONGO with MONGO_USER/MONGO_PASSWD/MONGO_HOST, \
                  or a local mongod on the default port."
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Load countries, states and cities from JSON backup files
    Seed(commands::seed::SeedArgs),
    /// Check that the configured database is reachable
    Ping(commands::ping::PingArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Variables from .env feed both DbConfig and clap's env fallbacks
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init_tracing(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Seed(args) => commands::run_seed(args).await?,
        Commands::Ping(args) => commands::run_ping(args).await?,
    }
    Ok(())
}
