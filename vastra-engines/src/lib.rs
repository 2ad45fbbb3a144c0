//! Concrete inference engines for the Vastra try-on service.
//!
//! This crate provides implementations of the
//! [`InferenceEngine`](vastra_job_queue::InferenceEngine) trait consumed by the
//! job manager.
//!
//! # Engines
//!
//! - `composite` - scales the overlay into the subject image and encodes a PNG
//! - `remote` - forwards work to an external model service over HTTP
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use vastra_blobs::MemoryBlobStore;
//! use vastra_engines::CompositeEngine;
//! use vastra_job_queue::{JobManager, ManagerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = CompositeEngine::new().with_latency(Duration::from_millis(250));
//!     let manager = JobManager::new(
//!         Arc::new(MemoryBlobStore::new()),
//!         Arc::new(engine),
//!         ManagerOptions::default(),
//!     );
//!     manager.warm_up().await;
//! }
//! ```

mod composite;
mod error;
mod remote;

pub use composite::CompositeEngine;
pub use error::EngineError;
pub use remote::{RemoteEngine, DEFAULT_MAX_ARTIFACT_BYTES};

/// Engine name constants, as reported in metrics and health output.
pub mod engine_names {
    pub const COMPOSITE: &str = "composite";
    pub const REMOTE: &str = "remote";
}
