//! Custom Axum extractors
//!
//! Path keys are normalised and validated here, so handlers receive typed
//! keys and every rejection is a JSON [`ApiError`].

use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query, Request};
use axum::http::request::Parts;
use geoctl_core::models::{CityKey, CountryCode, Payload, StateKey, ValidationError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;

/// Country code from `/countries/{code}`
pub struct CountryPath(pub CountryCode);

impl<S> FromRequestParts<S> for CountryPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(code): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::from(ValidationError::Missing { field: "code" }))?;
        Ok(Self(CountryCode::new(&code)?))
    }
}

/// State key from `/states/{country_code}/{state_code}`
pub struct StatePath(pub StateKey);

impl<S> FromRequestParts<S> for StatePath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((country_code, state_code)): Path<(String, String)> =
            Path::from_request_parts(parts, state).await.map_err(|_| {
                ApiError::from(ValidationError::Missing {
                    field: "state_code",
                })
            })?;
        Ok(Self(StateKey::new(&country_code, &state_code)?))
    }
}

/// City key from `/cities/{state_code}/{name}`; the name is percent-decoded
pub struct CityPath(pub CityKey);

impl<S> FromRequestParts<S> for CityPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((state_code, name)): Path<(String, String)> =
            Path::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::from(ValidationError::Missing { field: "name" }))?;
        Ok(Self(CityKey::new(&state_code, &name)?))
    }
}

/// Query string with rejections turned into JSON errors
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest {
                message: e.body_text(),
            })?;
        Ok(Self(value))
    }
}

/// Request body that must be a JSON object
pub struct JsonObject(pub Payload);

impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value): Json<Value> =
            Json::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest {
                    message: e.body_text(),
                })?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ValidationError::WrongType {
                field: "body",
                expected: "a JSON object",
            }
            .into()),
        }
    }
}
