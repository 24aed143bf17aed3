//! Router assembly.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use crate::gatekeeper::handle_artifact;
use crate::state::AppState;

/// Path of the deploy endpoint.
pub const ARTIFACT_ENDPOINT: &str = "/artifact";

/// Path of the liveness check.
pub const HEALTH_ENDPOINT: &str = "/health";

/// Build the application router.
///
/// - `/artifact` → every method reaches the gatekeeper so non-PUT
///   requests get the deploy receiver's own 405
/// - `/health`   → liveness check, no auth
///
/// The request body cap comes from the state's upload limit.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes();
    Router::new()
        .route(ARTIFACT_ENDPOINT, any(handle_artifact))
        .route(HEALTH_ENDPOINT, get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Minimal health-check handler for load balancers.
async fn health() -> StatusCode {
    StatusCode::OK
}
