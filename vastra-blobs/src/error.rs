//! Error types for blob storage.

use thiserror::Error;

/// Errors raised by blob store backends.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid blob handle: {0}")]
    InvalidHandle(String),

    #[error("blob storage io error: {0}")]
    Io(#[from] std::io::Error),
}
