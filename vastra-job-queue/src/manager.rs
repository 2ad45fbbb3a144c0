//! Job lifecycle manager.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use vastra_blobs::{BlobHandle, BlobStore};

use crate::engine::{InferenceEngine, InferenceError, InferenceMetrics, InferenceRequest};
use crate::error::JobQueueError;
use crate::store::{JobSlot, JobStore};
use crate::types::{
    Artifact, HealthReport, Job, JobId, JobPage, JobResult, JobStatus, QueueStats,
    PROGRESS_INFERRED, PROGRESS_INPUTS_LOADED,
};

/// Maximum number of jobs to keep in memory by default.
pub const DEFAULT_MAX_JOBS: usize = 1000;

/// Tunables for a [`JobManager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Jobs kept before the oldest terminal ones are evicted.
    pub max_jobs: usize,
    /// Concurrent engine invocations.
    pub workers: usize,
    /// Upper bound for each uploaded image.
    pub max_image_bytes: usize,
    /// Engine calls running longer than this fail the job.
    pub engine_timeout: Option<Duration>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            max_jobs: DEFAULT_MAX_JOBS,
            workers: 4,
            max_image_bytes: 10 * 1024 * 1024,
            engine_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Creates jobs, drives them through their lifecycle and reports on them.
///
/// Cloning is cheap; clones share the same store, engine and worker pool.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<JobStore>,
    blobs: Arc<dyn BlobStore>,
    engine: Arc<dyn InferenceEngine>,
    workers: Arc<Semaphore>,
    closing: Arc<AtomicBool>,
    options: Arc<ManagerOptions>,
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("store", &"<JobStore>")
            .field("blobs", &self.blobs.kind())
            .field("engine", &self.engine.name())
            .field("options", &self.options)
            .finish()
    }
}

impl JobManager {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        engine: Arc<dyn InferenceEngine>,
        options: ManagerOptions,
    ) -> Self {
        let workers = options.workers.max(1);
        Self {
            store: Arc::new(JobStore::new(options.max_jobs)),
            blobs,
            engine,
            workers: Arc::new(Semaphore::new(workers)),
            closing: Arc::new(AtomicBool::new(false)),
            options: Arc::new(ManagerOptions { workers, ..options }),
        }
    }

    /// Warm the engine. A failed warm-up is logged and reported through
    /// [`health`](Self::health); the manager still starts.
    pub async fn warm_up(&self) -> bool {
        let started = Instant::now();
        match self.engine.warm_up().await {
            Ok(()) => {
                tracing::info!(
                    engine = self.engine.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ready = self.engine.is_ready(),
                    "inference engine warmed up"
                );
            }
            Err(e) => {
                tracing::warn!(engine = self.engine.name(), %e, "inference engine warm-up failed");
            }
        }
        self.engine.is_ready()
    }

    fn ensure_open(&self) -> Result<(), JobQueueError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(JobQueueError::Unavailable);
        }
        Ok(())
    }

    fn validate_image(&self, field: &str, bytes: &[u8]) -> Result<(), JobQueueError> {
        if bytes.len() > self.options.max_image_bytes {
            return Err(JobQueueError::InvalidInput(format!(
                "{field} image is {} bytes; limit is {}",
                bytes.len(),
                self.options.max_image_bytes
            )));
        }
        if vastra_blobs::detect_image(bytes).is_none() {
            return Err(JobQueueError::InvalidInput(format!(
                "{field} image must be jpeg, png or webp"
            )));
        }
        Ok(())
    }

    /// Store the images and register a new queued job.
    pub async fn create(
        &self,
        subject: Option<Bytes>,
        overlay: Option<Bytes>,
    ) -> Result<JobId, JobQueueError> {
        self.ensure_open()?;

        let subject = subject
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| JobQueueError::InvalidInput("subject image is required".into()))?;
        let overlay = overlay.filter(|bytes| !bytes.is_empty());

        self.validate_image("subject", &subject)?;
        if let Some(overlay) = &overlay {
            self.validate_image("overlay", overlay)?;
        }

        let subject_handle = self.blobs.put(subject).await?;
        let overlay_handle = match overlay {
            Some(bytes) => Some(self.blobs.put(bytes).await?),
            None => None,
        };

        let job = Job::new(JobId::new(), subject_handle, overlay_handle);
        let id = job.id;
        let evicted = self.store.insert(job).await?;

        tracing::info!(job_id = %id, "job created");
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted oldest finished jobs");
        }
        Ok(id)
    }

    /// Consistent snapshot of a job.
    pub async fn status(&self, id: JobId) -> Result<Job, JobQueueError> {
        let slot = self.slot(id)?;
        Ok(slot.snapshot().await)
    }

    fn slot(&self, id: JobId) -> Result<JobSlot, JobQueueError> {
        self.store
            .slot(&id)
            .ok_or_else(|| JobQueueError::NotFound(format!("job {id}")))
    }

    /// Process a queued job inline and return its terminal snapshot.
    ///
    /// Engine failures are recorded on the job, so the call itself succeeds
    /// with a `Failed` snapshot. The run lives on its own task: dropping this
    /// future detaches it, and the job still reaches a terminal state.
    pub async fn process(&self, id: JobId) -> Result<Job, JobQueueError> {
        let (slot, started) = self.begin(id).await?;
        match self.spawn_execute(slot.clone(), started).await {
            Ok(job) => Ok(job),
            Err(e) => {
                tracing::error!(job_id = %id, %e, "job run task ended abnormally");
                Ok(slot.snapshot().await)
            }
        }
    }

    /// Accept a queued job and process it on a background task.
    ///
    /// Returns the `Processing` snapshot; callers poll [`status`](Self::status).
    pub async fn submit(&self, id: JobId) -> Result<Job, JobQueueError> {
        let (slot, started) = self.begin(id).await?;
        let snapshot = started.clone();
        drop(self.spawn_execute(slot, started));
        Ok(snapshot)
    }

    fn spawn_execute(&self, slot: JobSlot, started: Job) -> JoinHandle<Job> {
        let manager = self.clone();
        tokio::spawn(async move { manager.execute(slot, started).await })
    }

    /// Queued -> Processing, under the job's lock.
    async fn begin(&self, id: JobId) -> Result<(JobSlot, Job), JobQueueError> {
        self.ensure_open()?;
        let slot = self.slot(id)?;

        // A job that already left `queued` is rejected before storage is consulted.
        let subject = {
            let job = slot.lock().await;
            if job.status != JobStatus::Queued {
                return Err(JobQueueError::InvalidState {
                    id,
                    status: job.status,
                });
            }
            job.subject_handle.clone()
        };
        if !self.blobs.exists(&subject).await? {
            tracing::error!(job_id = %id, handle = %subject, "subject blob missing; refusing to process");
            return Err(JobQueueError::StorageMissing(subject));
        }

        let started = {
            let mut job = slot.lock().await;
            job.start()?;
            job.clone()
        };

        tracing::info!(job_id = %id, engine = self.engine.name(), "job processing started");
        Ok((slot, started))
    }

    /// Run the engine and record the outcome. Always leaves the job terminal.
    async fn execute(&self, slot: JobSlot, started: Job) -> Job {
        let clock = Instant::now();
        // Held until the outcome is recorded so shutdown drains terminal jobs.
        let permit = Arc::clone(&self.workers).acquire_owned().await.ok();
        let outcome = match &permit {
            Some(_) => self.run(&slot, &started).await,
            None => Err(JobQueueError::Unavailable),
        };
        let elapsed_ms = clock.elapsed().as_millis() as u64;

        let mut job = slot.lock().await;
        let recorded = match outcome {
            Ok((artifact_handle, metrics)) => job.complete(JobResult {
                artifact_handle,
                metrics,
                processing_duration_ms: elapsed_ms,
            }),
            Err(cause) => job.fail(cause.to_string()),
        };

        match (&recorded, job.status) {
            (Err(e), _) => {
                tracing::error!(job_id = %job.id, %e, "could not record job outcome");
            }
            (Ok(()), JobStatus::Completed) => {
                tracing::info!(job_id = %job.id, elapsed_ms, "job completed");
            }
            (Ok(()), _) => {
                tracing::warn!(
                    job_id = %job.id,
                    elapsed_ms,
                    error = job.error.as_deref().unwrap_or("-"),
                    "job failed"
                );
            }
        }
        let snapshot = job.clone();
        drop(job);
        drop(permit);
        snapshot
    }

    async fn run(
        &self,
        slot: &JobSlot,
        job: &Job,
    ) -> Result<(BlobHandle, InferenceMetrics), JobQueueError> {
        let subject = self.load(&job.subject_handle).await?;
        let overlay = match &job.overlay_handle {
            Some(handle) => Some(self.load(handle).await?),
            None => None,
        };
        slot.lock().await.advance_progress(PROGRESS_INPUTS_LOADED);

        let request = InferenceRequest {
            job_id: job.id,
            subject,
            overlay,
        };
        let engine = Arc::clone(&self.engine);
        let mut task = tokio::spawn(async move { engine.infer(request).await });

        let joined = match self.options.engine_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(InferenceError::Timeout(limit).into());
                }
            },
            None => task.await,
        };
        let mut output = joined
            .map_err(|e| JobQueueError::from(InferenceError::Aborted(e.to_string())))??;

        if output.artifact.is_empty() {
            return Err(InferenceError::Backend("engine produced an empty artifact".into()).into());
        }
        slot.lock().await.advance_progress(PROGRESS_INFERRED);

        output.metrics.engine = self.engine.name().to_string();
        let handle = self.blobs.put(output.artifact).await?;
        Ok((handle, output.metrics))
    }

    async fn load(&self, handle: &BlobHandle) -> Result<Bytes, JobQueueError> {
        self.blobs
            .get(handle)
            .await?
            .ok_or_else(|| JobQueueError::StorageMissing(handle.clone()))
    }

    /// Fetch the artifact of a completed job.
    pub async fn result(&self, id: JobId) -> Result<Artifact, JobQueueError> {
        let job = self.status(id).await?;
        let handle = match (job.status, job.result) {
            (JobStatus::Completed, Some(result)) => result.artifact_handle,
            (status, _) => {
                return Err(JobQueueError::NotFound(format!(
                    "result for job {id} ({status})"
                )))
            }
        };

        let bytes = self.blobs.get(&handle).await?.ok_or_else(|| {
            tracing::error!(job_id = %id, handle = %handle, "artifact blob missing");
            JobQueueError::StorageMissing(handle.clone())
        })?;
        let content_type = vastra_blobs::content_type(&bytes);

        Ok(Artifact {
            handle,
            bytes,
            content_type,
        })
    }

    /// List jobs, most recent first, optionally filtered by status.
    pub async fn list(&self, status: Option<JobStatus>, limit: usize, offset: usize) -> JobPage {
        let matching: Vec<Job> = self
            .store
            .snapshots_recent()
            .await
            .into_iter()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .collect();

        let total = matching.len();
        let items = matching.into_iter().skip(offset).take(limit).collect();
        JobPage { items, total }
    }

    /// Queue occupancy.
    pub async fn stats(&self) -> QueueStats {
        let by_status = self.store.counts().await;
        QueueStats {
            total: by_status.total(),
            by_status,
            capacity: self.store.capacity(),
            workers: self.options.workers,
            busy_workers: self
                .options
                .workers
                .saturating_sub(self.workers.available_permits()),
        }
    }

    /// Liveness and engine readiness.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: if self.closing.load(Ordering::Acquire) {
                "shutting_down"
            } else {
                "ok"
            },
            engine: self.engine.name().to_string(),
            engine_ready: self.engine.is_ready(),
            blob_store: self.blobs.kind().to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Drop terminal jobs that finished more than `retention` ago.
    pub async fn evict_expired(&self, retention: Duration) -> usize {
        let Ok(window) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let evicted = self.store.evict_finished_before(Utc::now() - window).await;
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "evicted expired jobs");
        }
        evicted.len()
    }

    /// Stop accepting work and wait up to `grace` for in-flight engine runs.
    ///
    /// Returns true when every worker drained in time. Jobs still waiting for
    /// a worker afterwards fail with `Unavailable`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.closing.store(true, Ordering::Release);
        let permits = u32::try_from(self.options.workers).unwrap_or(u32::MAX);

        let drained = match tokio::time::timeout(grace, self.workers.acquire_many(permits)).await
        {
            Ok(Ok(_all)) => true,
            Ok(Err(_)) => true,
            Err(_) => false,
        };
        self.workers.close();

        if drained {
            tracing::info!("job manager drained");
        } else {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "job manager shutdown timed out with work in flight");
        }
        drained
    }
}
