use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::Json;
use serde_json::{json, Value};
use vastra_job_queue::JobStatus;

use super::dto::job_to_payload;
use crate::handlers::utils::parse_positive_usize;
use crate::{error::ApiError, state::AppState};

/// GET /try-on/jobs
/// List jobs, newest first, with optional status filter and pagination.
pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let params = query.ok().map(|value| value.0).unwrap_or_default();
    let page = parse_positive_usize(params.get("page"), 1, "page")?;
    let per_page = parse_positive_usize(params.get("perPage"), 20, "perPage")?.min(100);
    let offset = (page - 1).saturating_mul(per_page);
    let status = params
        .get("status")
        .map(|s| s.parse::<JobStatus>())
        .transpose()?;

    let listed = state.jobs.list(status, per_page, offset).await;
    let items: Vec<Value> = listed.items.iter().map(job_to_payload).collect();

    Ok(Json(json!({
        "items": items,
        "pagination": {
            "page": page,
            "perPage": per_page,
            "total": listed.total,
        }
    })))
}
