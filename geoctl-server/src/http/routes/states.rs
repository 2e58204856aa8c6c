//! State endpoints

use std::sync::Arc;

use axum::{extract::State as AxumState, http::StatusCode, routing::get, Json, Router};
use geoctl_core::models::{Paginated, Pagination, PaginationParams, State};
use geoctl_core::repos::StateFilter;

use super::SortParam;
use crate::http::error::ApiError;
use crate::http::extractors::{JsonObject, StatePath, ValidQuery};
use crate::http::server::AppState;

pub(crate) const PATHS: &[&str] = &["/states", "/states/{country_code}/{state_code}"];

/// GET /states
async fn list_states(
    AxumState(app): AxumState<Arc<AppState>>,
    ValidQuery(page): ValidQuery<PaginationParams>,
    ValidQuery(sort): ValidQuery<SortParam>,
    ValidQuery(filter): ValidQuery<StateFilter>,
) -> Result<Json<Paginated<State>>, ApiError> {
    let result = app
        .data
        .states()
        .list(&filter, Pagination::from(page), sort.sort.as_deref())
        .await?;
    Ok(Json(result))
}

/// POST /states
async fn create_state(
    AxumState(app): AxumState<Arc<AppState>>,
    JsonObject(payload): JsonObject,
) -> Result<(StatusCode, Json<State>), ApiError> {
    let state = app.data.states().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(state)))
}

/// GET /states/{country_code}/{state_code}
async fn get_state(
    AxumState(app): AxumState<Arc<AppState>>,
    StatePath(key): StatePath,
) -> Result<Json<State>, ApiError> {
    Ok(Json(app.data.states().get(&key).await?))
}

/// PUT /states/{country_code}/{state_code}
async fn update_state(
    AxumState(app): AxumState<Arc<AppState>>,
    StatePath(key): StatePath,
    JsonObject(payload): JsonObject,
) -> Result<Json<State>, ApiError> {
    Ok(Json(app.data.states().update(&key, &payload).await?))
}

/// DELETE /states/{country_code}/{state_code}
async fn delete_state(
    AxumState(app): AxumState<Arc<AppState>>,
    StatePath(key): StatePath,
) -> Result<StatusCode, ApiError> {
    app.data.states().delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// State routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/states", get(list_states).post(create_state))
        .route(
            "/states/{country_code}/{state_code}",
            get(get_state).put(update_state).delete(delete_state),
        )
}
