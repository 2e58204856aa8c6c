//! geoctl-core: data-access layer for the geographic reference API
//!
//! Layers, leaves first:
//! - [`store`]: document store abstraction with MongoDB and in-memory backends
//! - [`connection`]: single shared handle with connect-check-retry policy
//! - [`cache`]: per-entity read-through cache, invalidated on write
//! - [`repos`]: typed CRUD for countries, states and cities
//!
//! [`DataLayer`] owns the connection manager and the caches and hands out
//! repositories that borrow them.

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod layer;
pub mod models;
pub mod repos;
pub mod seed;
pub mod store;

pub use config::{ConfigError, DbConfig, UriSource};
pub use connection::{ConnectionManager, ConnectionState, Connector};
pub use error::{GeoError, Result};
pub use layer::DataLayer;
