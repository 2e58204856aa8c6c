//! Self-describing endpoint listing

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

pub(crate) const PATHS: &[&str] = &["/endpoints"];

#[derive(Serialize)]
pub struct EndpointsResponse {
    pub endpoints: Vec<&'static str>,
}

/// GET /endpoints - sorted list of routed paths
async fn endpoints() -> Json<EndpointsResponse> {
    Json(EndpointsResponse {
        endpoints: super::paths(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/endpoints", get(endpoints))
}
