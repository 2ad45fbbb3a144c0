use std::time::Duration;

use tokio::task::JoinHandle;
use vastra_job_queue::JobManager;

/// Spawn the background task that drops finished jobs older than `retention`.
pub fn spawn_retention_sweeper(
    jobs: JobManager,
    retention: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing is old enough yet.
        interval.tick().await;

        loop {
            interval.tick().await;
            let evicted = jobs.evict_expired(retention).await;
            tracing::debug!(evicted, "retention sweep finished");
        }
    })
}
