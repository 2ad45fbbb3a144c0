use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;
use vastra_job_queue::JobQueueError;

/// Top-level API error shared by all route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    JobQueue(#[from] JobQueueError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::JobQueue(e) => match e {
                JobQueueError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                JobQueueError::NotFound(_) => StatusCode::NOT_FOUND,
                JobQueueError::InvalidState { .. } | JobQueueError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                JobQueueError::InferenceFailure(_) => StatusCode::BAD_GATEWAY,
                JobQueueError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                JobQueueError::StorageMissing(_) | JobQueueError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SerdeJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vastra_blobs::BlobHandle;
    use vastra_job_queue::{InferenceError, JobId, JobStatus};

    #[test]
    fn job_queue_errors_map_to_status_codes() {
        let cases = [
            (JobQueueError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (JobQueueError::NotFound("job".into()), StatusCode::NOT_FOUND),
            (
                JobQueueError::InvalidState {
                    id: JobId::new(),
                    status: JobStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (
                JobQueueError::InferenceFailure(InferenceError::NotReady),
                StatusCode::BAD_GATEWAY,
            ),
            (JobQueueError::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                JobQueueError::StorageMissing(BlobHandle::for_bytes(b"gone")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn body_carries_message() {
        let response = ApiError::bad_request("subject is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
