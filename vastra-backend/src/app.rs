use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{health, jobs};
use crate::state::AppState;

// Default body limit: 50 MB (two base64-encoded images at the upload cap fit comfortably)
const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Build the primary axum router with the provided shared application state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route(
            "/try-on/jobs",
            post(jobs::create::create).get(jobs::list::list),
        )
        .route("/try-on/jobs/{jobId}", get(jobs::get::get))
        .route("/try-on/jobs/{jobId}/process", post(jobs::process::process))
        .route("/try-on/jobs/{jobId}/result", get(jobs::result::result))
        .route("/try-on/stats", get(jobs::stats::stats));
    // health and readiness endpoints
    let router = router
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .fallback(|| async { ApiError::not_found("route") })
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
        .layer(Extension(state));

    Router::new()
        .nest("/api", router)
        .layer(TraceLayer::new_for_http())
}
