//! Try-on job lifecycle management.
//!
//! A job pairs a subject image with an optional overlay (garment) image. Jobs
//! start `queued`, move to `processing` exactly once when triggered, and end
//! `completed` (with an artifact in blob storage) or `failed` (with an error).
//!
//! # Architecture
//!
//! - [`JobManager`] - creates jobs, runs them through the engine, serves results
//! - [`InferenceEngine`] - trait for the pluggable image transformation
//! - [`Job`] - snapshot of a job's state
//! - [`JobQueueError`] - failure taxonomy surfaced to callers
//!
//! Each job lives behind its own lock in a sharded map, so callers working on
//! different jobs never contend, and a reader never sees a half-applied
//! transition. Engine calls happen outside any job lock.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vastra_blobs::MemoryBlobStore;
//! use vastra_job_queue::{JobManager, ManagerOptions, PassthroughEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = JobManager::new(
//!         Arc::new(MemoryBlobStore::new()),
//!         Arc::new(PassthroughEngine::new()),
//!         ManagerOptions::default(),
//!     );
//!     manager.warm_up().await;
//!
//!     let png = std::fs::read("subject.png").unwrap();
//!     let id = manager.create(Some(png.into()), None).await.unwrap();
//!     let job = manager.process(id).await.unwrap();
//!     println!("job {} finished as {}", job.id, job.status);
//! }
//! ```

mod engine;
mod error;
mod manager;
mod store;
mod types;

pub use engine::{
    InferenceEngine, InferenceError, InferenceMetrics, InferenceOutput, InferenceRequest,
    PassthroughEngine,
};
pub use error::JobQueueError;
pub use manager::{JobManager, ManagerOptions, DEFAULT_MAX_JOBS};
pub use types::{
    Artifact, HealthReport, Job, JobId, JobPage, JobResult, JobStatus, QueueStats, StatusCounts,
};

// Re-export async_trait for convenience when implementing InferenceEngine
pub use async_trait::async_trait;
