//! Error types for the job queue system.

use thiserror::Error;
use vastra_blobs::{BlobError, BlobHandle};

use crate::engine::InferenceError;
use crate::types::{JobId, JobStatus};

/// Errors that may occur while interacting with the job queue.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("job queue is shutting down")]
    Unavailable,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("job {id} is {status}")]
    InvalidState { id: JobId, status: JobStatus },

    #[error("inference failed: {0}")]
    InferenceFailure(#[from] InferenceError),

    #[error("blob {0} is missing from storage")]
    StorageMissing(BlobHandle),

    #[error("blob storage error: {0}")]
    Storage(#[from] BlobError),

    #[error("job id already exists: {0}")]
    Conflict(JobId),
}
