use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::handlers::utils::job_id_from_path;
use crate::{error::ApiError, state::AppState};

/// GET /try-on/jobs/{jobId}/result
/// Raw artifact bytes of a completed job.
pub async fn result(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let id = job_id_from_path(&path)?;
    let artifact = state.jobs.result(id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::ETAG, format!("\"{}\"", artifact.handle)),
            (
                header::CACHE_CONTROL,
                "private, max-age=31536000, immutable".to_string(),
            ),
        ],
        artifact.bytes,
    )
        .into_response())
}
