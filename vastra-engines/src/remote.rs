//! HTTP client for an external try-on model service.
//!
//! The service speaks a small protocol:
//!
//! - `GET  /health` answers 2xx once models are loaded
//! - `POST /tryon` takes multipart `image` and optional `garment` files and
//!   returns `{"job_id": "..."}`
//! - `POST /tryon/{job_id}/process` runs the model and returns
//!   `{"success": bool, "result": {"result_url", "processing_time", "quality_score"}, "error"}`
//! - the artifact is then fetched from `result_url`, resolved against the base url

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;
use vastra_job_queue::{
    async_trait, InferenceEngine, InferenceError, InferenceMetrics, InferenceOutput,
    InferenceRequest,
};

use crate::engine_names;
use crate::error::EngineError;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    success: bool,
    result: Option<RemoteResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteResult {
    result_url: Option<String>,
    result_path: Option<String>,
    /// Seconds.
    processing_time: Option<f64>,
    quality_score: Option<f64>,
}

/// Largest artifact read back from the service unless configured otherwise.
pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 50 * 1024 * 1024;

/// Engine backed by a remote model service.
#[derive(Debug)]
pub struct RemoteEngine {
    client: Client,
    base: Url,
    ready: AtomicBool,
    max_artifact_bytes: usize,
}

impl RemoteEngine {
    /// Build a client for the service at `base_url`. Requests time out after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let mut base =
            Url::parse(base_url).map_err(|e| EngineError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(EngineError::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(concat!("vastra/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base,
            ready: AtomicBool::new(false),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        })
    }

    /// Refuse artifacts larger than `limit` bytes.
    pub fn with_max_artifact_bytes(mut self, limit: usize) -> Self {
        self.max_artifact_bytes = limit.max(1);
        self
    }

    /// Base url all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, InferenceError> {
        self.base
            .join(path)
            .map_err(|e| InferenceError::Backend(format!("bad endpoint {path}: {e}")))
    }

    /// Map transport failures, marking the service unreachable on connect errors.
    fn transport(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            return InferenceError::Backend(format!("remote request timed out: {e}"));
        }
        if e.is_connect() {
            self.ready.store(false, Ordering::Release);
        }
        InferenceError::Backend(format!("remote request failed: {e}"))
    }

    async fn checked(&self, response: Response) -> Result<Response, InferenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        warn!(%status, %message, "remote engine returned an error status");
        Err(InferenceError::Backend(format!("remote status {status}: {message}")))
    }

    fn file_part(name: &'static str, bytes: &Bytes) -> Result<Part, InferenceError> {
        let mime = vastra_blobs::content_type(bytes);
        let extension = mime.rsplit('/').next().unwrap_or("bin");
        Part::bytes(bytes.to_vec())
            .file_name(format!("{name}.{extension}"))
            .mime_str(mime)
            .map_err(|e| InferenceError::Backend(format!("multipart {name}: {e}")))
    }

    async fn submit(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let mut form = Form::new().part("image", Self::file_part("image", &request.subject)?);
        if let Some(overlay) = &request.overlay {
            form = form.part("garment", Self::file_part("garment", overlay)?);
        }

        let response = self
            .client
            .post(self.endpoint("tryon")?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let parsed: SubmitResponse = self
            .checked(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::Backend(format!("invalid submit response: {e}")))?;

        match (parsed.job_id, parsed.error) {
            (Some(id), _) if !id.is_empty() => Ok(id),
            (_, Some(error)) => Err(InferenceError::Backend(error)),
            _ => Err(InferenceError::Backend(
                "remote service did not return a job id".into(),
            )),
        }
    }

    async fn run(&self, remote_id: &str) -> Result<RemoteResult, InferenceError> {
        let response = self
            .client
            .post(self.endpoint(&format!("tryon/{remote_id}/process"))?)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let parsed: ProcessResponse = self
            .checked(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::Backend(format!("invalid process response: {e}")))?;

        if !parsed.success {
            return Err(InferenceError::Backend(
                parsed
                    .error
                    .unwrap_or_else(|| "remote processing failed".into()),
            ));
        }
        parsed
            .result
            .ok_or_else(|| InferenceError::Backend("remote service returned no result".into()))
    }

    async fn fetch(&self, location: &str) -> Result<Bytes, InferenceError> {
        let response = self
            .client
            .get(self.endpoint(location)?)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let mut response = self.checked(response).await?;

        let limit = self.max_artifact_bytes;
        let oversized = |size: u64| {
            warn!(size, limit, "remote artifact exceeds the size limit");
            InferenceError::Backend(format!(
                "remote artifact is larger than {limit} bytes"
            ))
        };
        if let Some(declared) = response.content_length() {
            if declared > limit as u64 {
                return Err(oversized(declared));
            }
        }

        // Content-Length is advisory; the cap also applies while reading.
        let mut artifact = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport(e))? {
            if artifact.len() + chunk.len() > limit {
                return Err(oversized((artifact.len() + chunk.len()) as u64));
            }
            artifact.extend_from_slice(&chunk);
        }
        Ok(artifact.freeze())
    }
}

#[async_trait]
impl InferenceEngine for RemoteEngine {
    fn name(&self) -> &str {
        engine_names::REMOTE
    }

    async fn warm_up(&self) -> Result<(), InferenceError> {
        let response = self
            .client
            .get(self.endpoint("health")?)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        self.checked(response).await?;
        self.ready.store(true, Ordering::Release);
        info!(url = %self.base, "remote engine is healthy");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn infer(&self, request: InferenceRequest) -> Result<InferenceOutput, InferenceError> {
        let remote_id = self.submit(&request).await?;
        debug!(job_id = %request.job_id, %remote_id, "submitted to remote engine");

        let result = self.run(&remote_id).await?;
        let location = result
            .result_url
            .as_deref()
            .ok_or_else(|| InferenceError::Backend("remote result has no result_url".into()))?;
        let artifact = self.fetch(location).await?;
        self.ready.store(true, Ordering::Release);

        Ok(InferenceOutput {
            artifact,
            metrics: InferenceMetrics {
                engine_time_ms: result
                    .processing_time
                    .filter(|secs| secs.is_finite() && *secs >= 0.0)
                    .map(|secs| (secs * 1000.0).round() as u64),
                quality_score: result.quality_score,
                details: json!({
                    "remote_job_id": remote_id,
                    "result_path": result.result_path,
                }),
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let engine = RemoteEngine::new("http://localhost:5001/models", Duration::from_secs(1)).unwrap();
        assert_eq!(engine.base_url().as_str(), "http://localhost:5001/models/");
        assert_eq!(
            engine.endpoint("tryon/abc/process").unwrap().as_str(),
            "http://localhost:5001/models/tryon/abc/process"
        );
    }

    #[test]
    fn absolute_result_urls_are_kept() {
        let engine = RemoteEngine::new("http://localhost:5001", Duration::from_secs(1)).unwrap();
        assert_eq!(
            engine.endpoint("http://cdn.local/r.png").unwrap().as_str(),
            "http://cdn.local/r.png"
        );
        assert_eq!(
            engine.endpoint("/results/r.png").unwrap().as_str(),
            "http://localhost:5001/results/r.png"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            RemoteEngine::new("ftp://models", Duration::from_secs(1)),
            Err(EngineError::InvalidUrl(_))
        ));
        assert!(matches!(
            RemoteEngine::new("not a url", Duration::from_secs(1)),
            Err(EngineError::InvalidUrl(_))
        ));
    }

    #[test]
    fn starts_not_ready() {
        let engine = RemoteEngine::new("http://localhost:5001", Duration::from_secs(1)).unwrap();
        assert!(!engine.is_ready());
        assert_eq!(engine.name(), "remote");
    }
}
