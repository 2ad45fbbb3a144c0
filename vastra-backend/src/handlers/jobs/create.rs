use std::sync::Arc;

use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use serde_json::{json, Value};
use vastra_job_queue::JobStatus;

use super::dto::CreateJobRequest;
use crate::handlers::utils::decode_image;
use crate::{error::ApiError, state::AppState};

/// POST /try-on/jobs
/// Store the uploaded images and register a queued job.
pub async fn create(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let payload = body
        .ok_or_else(|| ApiError::bad_request("missing request body"))?
        .0;
    let request: CreateJobRequest = serde_json::from_value(payload)?;

    let subject = decode_image("subject", request.subject.as_deref())?;
    let overlay = decode_image("overlay", request.overlay.as_deref())?;

    let id = state.jobs.create(subject, overlay).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "status": JobStatus::Queued,
        })),
    ))
}
