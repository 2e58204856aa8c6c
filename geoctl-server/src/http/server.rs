//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C, then the data layer is closed

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use geoctl_core::DataLayer;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cors_permissive: false,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub data: DataLayer,
}

impl AppState {
    pub fn new(data: DataLayer) -> Self {
        Self { data }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:8000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://127.0.0.1:8000"),
        ])
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Assemble every route with CORS and request tracing.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::countries::router())
        .merge(routes::states::router())
        .merge(routes::cities::router())
        .merge(routes::endpoints::router())
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until a shutdown signal, then close the data layer.
///
/// The data layer should already be started; a database that is down at
/// startup only makes `/readyz` fail until it comes back.
pub async fn run_server(data: DataLayer, config: ServerConfig) -> Result<(), ServerError> {
    let state = Arc::new(AppState::new(data));
    let app = build_router(Arc::clone(&state), &config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.data.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
