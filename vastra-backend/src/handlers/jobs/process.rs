use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use vastra_config::ProcessingMode;

use super::dto::job_to_payload;
use crate::handlers::utils::job_id_from_path;
use crate::{error::ApiError, state::AppState};

/// POST /try-on/jobs/{jobId}/process
///
/// Inline mode answers with the terminal job once the engine is done.
/// Background mode answers `202 Accepted` with the `processing` job.
pub async fn process(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let id = job_id_from_path(&path)?;

    let (status, job) = match state.mode {
        ProcessingMode::Inline => (StatusCode::OK, state.jobs.process(id).await?),
        ProcessingMode::Background => (StatusCode::ACCEPTED, state.jobs.submit(id).await?),
    };
    Ok((status, Json(job_to_payload(&job))))
}
