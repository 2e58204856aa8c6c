//! Validation error types

use std::fmt;

/// Validation error for payloads, keys and list queries
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required field absent
    Missing { field: &'static str },

    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// Field has the wrong JSON type
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// String doesn't match required format (e.g., ISO code)
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Number outside its allowed range
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },

    /// Field not part of the entity schema
    UnknownField { field: String },

    /// Key field changed in an update
    Immutable { field: &'static str },

    /// Referenced parent entity does not exist
    MissingParent { resource: &'static str, key: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "missing required field: {}", field),
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::WrongType { field, expected } => {
                write!(f, "{} must be {}", field, expected)
            }
            Self::InvalidFormat { field, reason } => write!(f, "{}: {}", field, reason),
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::OutOfRange { field, reason } => write!(f, "{} {}", field, reason),
            Self::UnknownField { field } => write!(f, "unknown field: {}", field),
            Self::Immutable { field } => write!(f, "{} cannot be changed", field),
            Self::MissingParent { resource, key } => {
                write!(f, "parent {} '{}' does not exist", resource, key)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
