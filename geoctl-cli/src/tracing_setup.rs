//! Tracing setup for the geoctl CLI
//!
//! Usage:
//!   geoctl --debug ...                     # Debug logging
//!   RUST_LOG=geoctl_core=trace geoctl ...  # Fine-grained log control
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (sets the filter to debug if RUST_LOG is not set)
    pub debug: bool,
}

pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let default = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
