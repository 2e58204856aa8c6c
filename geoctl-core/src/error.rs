//! Error taxonomy for the data-access layer.
//!
//! Repositories translate [`StoreError`] into [`GeoError`]; route handlers only
//! ever see the kinds below.

use thiserror::Error;

use crate::models::ValidationError;
use crate::store::StoreError;

/// Result type alias for data-access operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Main error type for repository and connection operations
#[derive(Error, Debug)]
pub enum GeoError {
    /// Bad or missing fields, bad filters, missing parent entity
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Primary key already present
    #[error("{resource} '{key}' already exists")]
    DuplicateKey { resource: &'static str, key: String },

    /// Primary key absent
    #[error("{resource} '{key}' not found")]
    NotFound { resource: &'static str, key: String },

    /// Database unreachable after the single reconnect attempt
    #[error("database unreachable: {reason}")]
    Connection { reason: String },

    /// Operation exceeded the configured bound
    #[error("database operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Any other driver failure, already translated to text
    #[error("database error: {message}")]
    Database { message: String },
}

impl GeoError {
    /// Create a not-found error
    pub fn not_found(resource: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            key: key.into(),
        }
    }

    /// Create a duplicate-key error
    pub fn duplicate(resource: &'static str, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            resource,
            key: key.into(),
        }
    }

    /// Create a generic database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Re-label a duplicate-key error raised by the store's unique index with
    /// the repository's resource name and key.
    pub fn for_key(self, resource: &'static str, key: &str) -> Self {
        match self {
            Self::DuplicateKey { .. } => Self::duplicate(resource, key),
            other => other,
        }
    }

    /// Stable machine-readable kind, used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::NotFound { .. } => "not_found",
            Self::Connection { .. } => "connection_error",
            Self::Timeout { .. } => "timeout",
            Self::Database { .. } => "internal_error",
        }
    }
}

impl From<StoreError> for GeoError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(reason) => Self::Connection { reason },
            StoreError::DuplicateKey(detail) => Self::duplicate("document", detail),
            StoreError::Backend(message) | StoreError::Serialization(message) => {
                Self::Database { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GeoError::not_found("country", "ZZ");
        assert_eq!(err.to_string(), "country 'ZZ' not found");

        let err = GeoError::duplicate("state", "US/TS");
        assert_eq!(err.to_string(), "state 'US/TS' already exists");
    }

    #[test]
    fn store_errors_translate_to_taxonomy() {
        let err: GeoError = StoreError::Connection("reset".into()).into();
        assert!(matches!(err, GeoError::Connection { .. }));

        let err: GeoError = StoreError::Backend("boom".into()).into();
        assert_eq!(err.kind(), "internal_error");

        let err: GeoError = StoreError::DuplicateKey("E11000".into()).into();
        let err = err.for_key("country", "US");
        assert_eq!(err.to_string(), "country 'US' already exists");
    }

    #[test]
    fn for_key_leaves_other_kinds_alone() {
        let err = GeoError::not_found("city", "IL/Springfield").for_key("country", "US");
        assert!(matches!(err, GeoError::NotFound { resource: "city", .. }));
    }
}
