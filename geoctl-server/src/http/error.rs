//! API error types with IntoResponse
//!
//! Errors are converted to `{"error": <kind>, "message": <text>}` with the
//! status code for their kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use geoctl_core::models::ValidationError;
use geoctl_core::GeoError;
use serde_json::json;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Anything the data layer reported
    Geo(GeoError),

    /// Malformed request the data layer never saw (bad JSON, bad query string)
    BadRequest { message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Geo(e) => match e {
                GeoError::Validation(_) => StatusCode::BAD_REQUEST,
                GeoError::DuplicateKey { .. } => StatusCode::CONFLICT,
                GeoError::NotFound { .. } => StatusCode::NOT_FOUND,
                GeoError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
                GeoError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                GeoError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Geo(e) => e.kind(),
            Self::BadRequest { .. } => "bad_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Geo(e @ GeoError::Database { .. }) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                "an internal error occurred".to_string()
            }
            Self::Geo(e @ (GeoError::Connection { .. } | GeoError::Timeout { .. })) => {
                tracing::warn!("Database unavailable: {}", e);
                e.to_string()
            }
            Self::Geo(e) => e.to_string(),
            Self::BadRequest { message } => message.clone(),
        };

        let body = json!({
            "error": self.kind(),
            "message": message
        });
        (status, Json(body)).into_response()
    }
}

impl From<GeoError> for ApiError {
    fn from(e: GeoError) -> Self {
        Self::Geo(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Geo(GeoError::Validation(e))
    }
}
