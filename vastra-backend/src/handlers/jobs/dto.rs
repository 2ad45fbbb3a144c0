use serde::Deserialize;
use serde_json::{json, Value};
use vastra_job_queue::{Job, JobId};

/// Body of `POST /try-on/jobs`. Images are base64 or `data:` URLs.
#[derive(Debug, Default, Deserialize)]
pub struct CreateJobRequest {
    #[serde(alias = "bodyImage", alias = "image")]
    pub subject: Option<String>,
    #[serde(alias = "garmentImage", alias = "garment")]
    pub overlay: Option<String>,
}

pub fn result_url(id: JobId) -> String {
    format!("/api/try-on/jobs/{id}/result")
}

pub fn job_to_payload(job: &Job) -> Value {
    let result = job.result.as_ref().map(|result| {
        json!({
            "artifactHandle": result.artifact_handle,
            "resultUrl": result_url(job.id),
            "processingDurationMs": result.processing_duration_ms,
            "metrics": result.metrics,
        })
    });

    json!({
        "id": job.id,
        "status": job.status,
        "progress": job.progress,
        "subjectHandle": job.subject_handle,
        "overlayHandle": job.overlay_handle,
        "createdAt": job.created_at.to_rfc3339(),
        "startedAt": job.started_at.map(|dt| dt.to_rfc3339()),
        "completedAt": job.completed_at.map(|dt| dt.to_rfc3339()),
        "result": result,
        "error": job.error,
    })
}
