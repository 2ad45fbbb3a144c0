//! Core types for the job queue system.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vastra_blobs::BlobHandle;

use crate::engine::InferenceMetrics;
use crate::error::JobQueueError;

pub(crate) const PROGRESS_STARTED: u8 = 10;
pub(crate) const PROGRESS_INPUTS_LOADED: u8 = 30;
pub(crate) const PROGRESS_INFERRED: u8 = 90;
pub(crate) const PROGRESS_DONE: u8 = 100;

/// Opaque job identifier: a random (v4) UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A string that is not a UUID can never name a job, so parsing reports `NotFound`.
impl FromStr for JobId {
    type Err = JobQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| JobQueueError::NotFound(format!("job {s}")))
    }
}

/// Status of a try-on job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

impl FromStr for JobStatus {
    type Err = JobQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(JobQueueError::InvalidInput(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

/// Outcome recorded on a job when it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub artifact_handle: BlobHandle,
    pub metrics: InferenceMetrics,
    pub processing_duration_ms: u64,
}

/// A try-on job. Values handed out by the manager are snapshots; mutating
/// them has no effect on the stored job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub subject_handle: BlobHandle,
    pub overlay_handle: Option<BlobHandle>,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl Job {
    /// Create a new queued job.
    pub(crate) fn new(
        id: JobId,
        subject_handle: BlobHandle,
        overlay_handle: Option<BlobHandle>,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            subject_handle,
            overlay_handle,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    fn require(&self, expected: JobStatus) -> Result<(), JobQueueError> {
        if self.status != expected {
            return Err(JobQueueError::InvalidState {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Queued -> Processing.
    pub(crate) fn start(&mut self) -> Result<(), JobQueueError> {
        self.require(JobStatus::Queued)?;
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        self.progress = PROGRESS_STARTED;
        Ok(())
    }

    /// Raise progress while processing. Never lowers it.
    pub(crate) fn advance_progress(&mut self, progress: u8) {
        if self.status == JobStatus::Processing {
            self.progress = self.progress.max(progress.min(PROGRESS_DONE));
        }
    }

    /// Processing -> Completed.
    pub(crate) fn complete(&mut self, result: JobResult) -> Result<(), JobQueueError> {
        self.require(JobStatus::Processing)?;
        self.status = JobStatus::Completed;
        self.progress = PROGRESS_DONE;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        Ok(())
    }

    /// Processing -> Failed.
    pub(crate) fn fail(&mut self, message: impl Into<String>) -> Result<(), JobQueueError> {
        self.require(JobStatus::Processing)?;
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(message.into());
        Ok(())
    }
}

/// Result bytes of a completed job, ready to serve.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub handle: BlobHandle,
    pub bytes: bytes::Bytes,
    pub content_type: &'static str,
}

/// One page of jobs, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub items: Vec<Job>,
    pub total: usize,
}

/// Per-status counts across the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub(crate) fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.failed
    }
}

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub by_status: StatusCounts,
    pub capacity: usize,
    pub workers: usize,
    pub busy_workers: usize,
}

/// Liveness report. Producing one never fails.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub engine: String,
    pub engine_ready: bool,
    pub blob_store: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued() -> Job {
        Job::new(JobId::new(), BlobHandle::for_bytes(b"subject"), None)
    }

    fn result() -> JobResult {
        JobResult {
            artifact_handle: BlobHandle::for_bytes(b"artifact"),
            metrics: InferenceMetrics::default(),
            processing_duration_ms: 5,
        }
    }

    #[test]
    fn happy_path_sets_fields_in_order() {
        let mut job = queued();
        assert_eq!(job.progress, 0);

        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, PROGRESS_STARTED);
        assert!(job.started_at.is_some());

        job.complete(result()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.result.is_some());
        assert!(job.error.is_none());
        assert!(job.started_at.unwrap() <= job.completed_at.unwrap());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = queued();
        job.start().unwrap();
        job.fail("engine exploded").unwrap();
        assert_eq!(job.error.as_deref(), Some("engine exploded"));
        assert!(job.result.is_none());

        assert!(matches!(
            job.start(),
            Err(JobQueueError::InvalidState { status: JobStatus::Failed, .. })
        ));
        assert!(job.complete(result()).is_err());
        assert!(job.fail("again").is_err());
        assert_eq!(job.error.as_deref(), Some("engine exploded"));
    }

    #[test]
    fn cannot_skip_processing() {
        let mut job = queued();
        assert!(job.complete(result()).is_err());
        assert!(job.fail("nope").is_err());
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn progress_only_moves_forward() {
        let mut job = queued();
        job.advance_progress(50);
        assert_eq!(job.progress, 0, "queued jobs do not report progress");

        job.start().unwrap();
        job.advance_progress(PROGRESS_INFERRED);
        job.advance_progress(PROGRESS_INPUTS_LOADED);
        assert_eq!(job.progress, PROGRESS_INFERRED);
        job.advance_progress(250);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn non_uuid_id_is_not_found() {
        assert!(matches!(
            "nonexistent-id".parse::<JobId>(),
            Err(JobQueueError::NotFound(_))
        ));
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
    }
}
