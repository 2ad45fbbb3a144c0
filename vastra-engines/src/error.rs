//! Engine construction errors.

use thiserror::Error;

/// Errors that may occur while building an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine url: {0}")]
    InvalidUrl(String),

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}
