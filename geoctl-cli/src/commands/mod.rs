//! Command implementations for the geoctl CLI

pub mod ping;
pub mod seed;
pub mod serve;

use anyhow::{Context, Result};
use geoctl_core::store::MemoryStore;
use geoctl_core::{DataLayer, DbConfig};

pub use ping::run_ping;
pub use seed::run_seed;
pub use serve::run_serve;

/// Database configuration from the environment (and `.env`).
pub(crate) fn db_config() -> Result<DbConfig> {
    DbConfig::from_env().context("Invalid database configuration")
}

/// A data layer over MongoDB, or over a fresh in-memory store.
pub(crate) fn data_layer(config: &DbConfig, in_memory: bool) -> DataLayer {
    if in_memory {
        tracing::info!("Using in-memory store; nothing will be persisted");
        DataLayer::in_memory(MemoryStore::new(), config)
    } else {
        tracing::info!(uri = %config.redacted_uri(), db = %config.db_name, "Using MongoDB");
        DataLayer::mongo(config)
    }
}

