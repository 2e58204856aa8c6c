//! Country endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use geoctl_core::models::{Country, Paginated, Pagination, PaginationParams};
use geoctl_core::repos::CountryFilter;

use super::SortParam;
use crate::http::error::ApiError;
use crate::http::extractors::{CountryPath, JsonObject, ValidQuery};
use crate::http::server::AppState;

pub(crate) const PATHS: &[&str] = &["/countries", "/countries/{code}"];

/// GET /countries
async fn list_countries(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PaginationParams>,
    ValidQuery(sort): ValidQuery<SortParam>,
    ValidQuery(filter): ValidQuery<CountryFilter>,
) -> Result<Json<Paginated<Country>>, ApiError> {
    let result = state
        .data
        .countries()
        .list(&filter, Pagination::from(page), sort.sort.as_deref())
        .await?;
    Ok(Json(result))
}

/// POST /countries
async fn create_country(
    State(state): State<Arc<AppState>>,
    JsonObject(payload): JsonObject,
) -> Result<(StatusCode, Json<Country>), ApiError> {
    let country = state.data.countries().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(country)))
}

/// GET /countries/{code}
async fn get_country(
    State(state): State<Arc<AppState>>,
    CountryPath(code): CountryPath,
) -> Result<Json<Country>, ApiError> {
    Ok(Json(state.data.countries().get(&code).await?))
}

/// PUT /countries/{code}
async fn update_country(
    State(state): State<Arc<AppState>>,
    CountryPath(code): CountryPath,
    JsonObject(payload): JsonObject,
) -> Result<Json<Country>, ApiError> {
    Ok(Json(state.data.countries().update(&code, &payload).await?))
}

/// DELETE /countries/{code}
async fn delete_country(
    State(state): State<Arc<AppState>>,
    CountryPath(code): CountryPath,
) -> Result<StatusCode, ApiError> {
    state.data.countries().delete(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Country routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/countries", get(list_countries).post(create_country))
        .route(
            "/countries/{code}",
            get(get_country).put(update_country).delete(delete_country),
        )
}
