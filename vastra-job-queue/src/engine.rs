//! Inference engine contract consumed by the job manager.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::JobId;

/// Input handed to an engine: the raw bytes behind the job's blob handles.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub job_id: JobId,
    pub subject: Bytes,
    pub overlay: Option<Bytes>,
}

/// Measurements an engine reports alongside its artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceMetrics {
    /// Name of the engine that produced the artifact; filled in by the manager.
    #[serde(default)]
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

/// Successful engine output.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub artifact: Bytes,
    pub metrics: InferenceMetrics,
}

/// Errors reported by inference engines.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference engine is not ready")]
    NotReady,

    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("engine backend error: {0}")]
    Backend(String),

    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine task aborted: {0}")]
    Aborted(String),
}

/// Trait for implementing inference engines.
///
/// The manager treats an engine as an opaque, slow and fallible black box.
/// Calls to [`infer`](InferenceEngine::infer) run on their own task, never
/// while a job lock is held.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Returns the engine name shown in metrics and health output.
    fn name(&self) -> &str;

    /// Load models or probe the backing service. Called once at startup.
    async fn warm_up(&self) -> Result<(), InferenceError> {
        Ok(())
    }

    /// Whether the engine can currently accept work.
    fn is_ready(&self) -> bool {
        true
    }

    /// Produce an artifact from the subject and optional overlay.
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceOutput, InferenceError>;
}

/// An engine that returns the subject image unchanged.
///
/// Useful as a placeholder when no real engine is configured, and in tests.
#[derive(Debug, Default, Clone)]
pub struct PassthroughEngine;

impl PassthroughEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InferenceEngine for PassthroughEngine {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn infer(&self, request: InferenceRequest) -> Result<InferenceOutput, InferenceError> {
        Ok(InferenceOutput {
            artifact: request.subject,
            metrics: InferenceMetrics::default(),
        })
    }
}
