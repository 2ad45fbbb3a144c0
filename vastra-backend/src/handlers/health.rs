use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Liveness: answers whenever the process is up, along with engine readiness.
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let report = state.jobs.health();
    Json(json!({
        "status": report.status,
        "engine": report.engine,
        "engineReady": report.engine_ready,
        "blobStore": report.blob_store,
        "mode": state.mode,
        "timestamp": report.timestamp.to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /ready
/// Readiness: 503 until the engine can take work, and again while shutting down.
pub async fn ready(Extension(state): Extension<Arc<AppState>>) -> (StatusCode, &'static str) {
    let report = state.jobs.health();
    if report.engine_ready && report.status == "ok" {
        (StatusCode::OK, "OK")
    } else if report.status != "ok" {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "engine not ready")
    }
}
