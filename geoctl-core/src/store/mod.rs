//! Document store abstraction
//!
//! Repositories talk to a [`DocumentStore`]; the connection manager decides
//! which concrete store handle they get. Two backends exist:
//! - [`mongo::MongoStore`] for MongoDB
//! - [`memory::MemoryStore`] for tests and `geoctl serve --in-memory`

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod filter;
pub mod memory;
pub mod mongo;

pub use filter::{Filter, FindOptions, Sort, SortDirection};
pub use memory::{MemoryConnector, MemoryStore};
pub use mongo::{MongoConnector, MongoStore};

/// A stored document: a JSON object without the backend's `_id`
pub type Document = serde_json::Map<String, Value>;

/// Failures reported by a store backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Network failure, server selection failure, or a closed handle
    #[error("connection failed: {0}")]
    Connection(String),

    /// Unique index violation
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether a reconnect could plausibly fix this failure.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Async access to a document database
///
/// Implementations must be cheap to share behind an `Arc`; every method takes
/// `&self`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lightweight liveness check
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Apply `$set` to the first matching document; returns the matched count.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
    ) -> Result<u64, StoreError>;

    /// Returns the deleted count.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Create a unique index over `fields` if it does not exist yet.
    async fn ensure_unique_index(
        &self,
        collection: &str,
        fields: &[&str],
    ) -> Result<(), StoreError>;
}
