//! City endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use geoctl_core::models::{City, Paginated, Pagination, PaginationParams};
use geoctl_core::repos::CityFilter;

use super::SortParam;
use crate::http::error::ApiError;
use crate::http::extractors::{CityPath, JsonObject, ValidQuery};
use crate::http::server::AppState;

pub(crate) const PATHS: &[&str] = &["/cities", "/cities/{state_code}/{name}"];

/// GET /cities
async fn list_cities(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PaginationParams>,
    ValidQuery(sort): ValidQuery<SortParam>,
    ValidQuery(filter): ValidQuery<CityFilter>,
) -> Result<Json<Paginated<City>>, ApiError> {
    let result = state
        .data
        .cities()
        .list(&filter, Pagination::from(page), sort.sort.as_deref())
        .await?;
    Ok(Json(result))
}

/// POST /cities
async fn create_city(
    State(state): State<Arc<AppState>>,
    JsonObject(payload): JsonObject,
) -> Result<(StatusCode, Json<City>), ApiError> {
    let city = state.data.cities().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(city)))
}

/// GET /cities/{state_code}/{name}
async fn get_city(
    State(state): State<Arc<AppState>>,
    CityPath(key): CityPath,
) -> Result<Json<City>, ApiError> {
    Ok(Json(state.data.cities().get(&key).await?))
}

/// PUT /cities/{state_code}/{name}
async fn update_city(
    State(state): State<Arc<AppState>>,
    CityPath(key): CityPath,
    JsonObject(payload): JsonObject,
) -> Result<Json<City>, ApiError> {
    Ok(Json(state.data.cities().update(&key, &payload).await?))
}

/// DELETE /cities/{state_code}/{name}
async fn delete_city(
    State(state): State<Arc<AppState>>,
    CityPath(key): CityPath,
) -> Result<StatusCode, ApiError> {
    state.data.cities().delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// City routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cities", get(list_cities).post(create_city))
        .route(
            "/cities/{state_code}/{name}",
            get(get_city).put(update_city).delete(delete_city),
        )
}
