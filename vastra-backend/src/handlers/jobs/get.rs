use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;

use super::dto::job_to_payload;
use crate::handlers::utils::job_id_from_path;
use crate::{error::ApiError, state::AppState};

/// GET /try-on/jobs/{jobId}
pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let id = job_id_from_path(&path)?;
    let job = state.jobs.status(id).await?;
    Ok(Json(job_to_payload(&job)))
}
