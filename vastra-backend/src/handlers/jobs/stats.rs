use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

/// GET /try-on/stats
/// Job counts per status and worker pool occupancy.
pub async fn stats(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let stats = state.jobs.stats().await;
    Ok(Json(json!({
        "total": stats.total,
        "byStatus": stats.by_status,
        "capacity": stats.capacity,
        "workers": stats.workers,
        "busyWorkers": stats.busy_workers,
        "mode": state.mode,
    })))
}
