use vastra_config::ProcessingMode;
use vastra_job_queue::JobManager;

/// Shared application state passed to every route handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub jobs: JobManager,
    /// Whether `process` requests wait for the engine or return once accepted.
    pub mode: ProcessingMode,
}

impl AppState {
    pub fn new(jobs: JobManager, mode: ProcessingMode) -> Self {
        Self { jobs, mode }
    }
}
