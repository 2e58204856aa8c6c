//! geoctl-server: REST API over the geoctl data layer
//!
//! Countries, states and cities with CRUD, plus liveness, readiness and an
//! endpoint listing.

pub mod http;

pub use http::{build_router, run_server, AppState, ServerConfig};
