//! Job store: a sharded lock table keyed by job id.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::JobQueueError;
use crate::types::{Job, JobId, JobStatus, StatusCounts};

/// Per-job lock. Handles are cheap to clone and outlive removal from the store,
/// so an in-flight run can always record its outcome.
#[derive(Debug, Clone)]
pub(crate) struct JobSlot {
    inner: Arc<Mutex<Job>>,
}

impl JobSlot {
    fn new(job: Job) -> Self {
        Self {
            inner: Arc::new(Mutex::new(job)),
        }
    }

    #[inline]
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Job> {
        self.inner.lock().await
    }

    #[inline]
    pub(crate) async fn snapshot(&self) -> Job {
        self.inner.lock().await.clone()
    }

    /// Whether the job can be dropped by retention. A job whose lock is held
    /// is being mutated and is never evictable.
    fn evictable(&self, cutoff: Option<DateTime<Utc>>) -> bool {
        let Ok(job) = self.inner.try_lock() else {
            return false;
        };
        if !job.status.is_terminal() {
            return false;
        }
        match (cutoff, job.completed_at) {
            (None, _) => true,
            (Some(cutoff), Some(done)) => done < cutoff,
            (Some(_), None) => false,
        }
    }
}

/// Jobs keyed by id, plus insertion order (oldest first) for listing and eviction.
#[derive(Debug)]
pub(crate) struct JobStore {
    jobs: DashMap<JobId, JobSlot>,
    order: Mutex<VecDeque<JobId>>,
    capacity: usize,
}

impl JobStore {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Insert a new job, then trim the oldest terminal jobs beyond capacity.
    /// Returns the ids that were evicted.
    pub(crate) async fn insert(&self, job: Job) -> Result<Vec<JobId>, JobQueueError> {
        let id = job.id;
        let mut order = self.order.lock().await;

        match self.jobs.entry(id) {
            Entry::Occupied(_) => return Err(JobQueueError::Conflict(id)),
            Entry::Vacant(vacant) => {
                vacant.insert(JobSlot::new(job));
            }
        }
        order.push_back(id);

        let mut evicted = Vec::new();
        while self.jobs.len() > self.capacity {
            match self.evict_oldest(&mut order) {
                Some(old_id) => evicted.push(old_id),
                None => {
                    tracing::warn!(
                        jobs = self.jobs.len(),
                        capacity = self.capacity,
                        "job store over capacity with no terminal jobs to evict"
                    );
                    break;
                }
            }
        }
        Ok(evicted)
    }

    fn evict_oldest(&self, order: &mut VecDeque<JobId>) -> Option<JobId> {
        let position = order
            .iter()
            .position(|id| self.slot(id).is_some_and(|slot| slot.evictable(None)))?;
        let id = order.remove(position)?;
        self.jobs.remove(&id);
        Some(id)
    }

    /// Get the lock handle for a job.
    #[inline]
    pub(crate) fn slot(&self, id: &JobId) -> Option<JobSlot> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot every job, most recent first.
    pub(crate) async fn snapshots_recent(&self) -> Vec<Job> {
        let ids: Vec<JobId> = {
            let order = self.order.lock().await;
            order.iter().rev().copied().collect()
        };

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(slot) = self.slot(&id) {
                jobs.push(slot.snapshot().await);
            }
        }
        jobs
    }

    /// Count jobs by status.
    pub(crate) async fn counts(&self) -> StatusCounts {
        let slots: Vec<JobSlot> = self.jobs.iter().map(|e| e.value().clone()).collect();
        let mut counts = StatusCounts::default();
        for slot in slots {
            let status: JobStatus = slot.lock().await.status;
            counts.record(status);
        }
        counts
    }

    /// Drop terminal jobs that finished before `cutoff`.
    pub(crate) async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        let mut order = self.order.lock().await;
        let mut evicted = Vec::new();
        order.retain(|id| {
            let expired = self
                .slot(id)
                .is_some_and(|slot| slot.evictable(Some(cutoff)));
            if expired {
                self.jobs.remove(id);
                evicted.push(*id);
            }
            !expired
        });
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InferenceMetrics;
    use crate::types::JobResult;
    use vastra_blobs::BlobHandle;

    fn job() -> Job {
        Job::new(JobId::new(), BlobHandle::for_bytes(b"subject"), None)
    }

    async fn finish(store: &JobStore, id: &JobId) {
        let slot = store.slot(id).unwrap();
        let mut job = slot.lock().await;
        job.start().unwrap();
        job.complete(JobResult {
            artifact_handle: BlobHandle::for_bytes(b"artifact"),
            metrics: InferenceMetrics::default(),
            processing_duration_ms: 1,
        })
        .unwrap();
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = JobStore::new(10);
        let first = job();
        let mut twin = job();
        twin.id = first.id;

        store.insert(first).await.unwrap();
        assert!(matches!(
            store.insert(twin).await,
            Err(JobQueueError::Conflict(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_terminal_only() {
        let store = JobStore::new(2);
        let a = job();
        let b = job();
        let (a_id, b_id) = (a.id, b.id);
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();
        finish(&store, &b_id).await;

        let c = job();
        let c_id = c.id;
        let evicted = store.insert(c).await.unwrap();

        // `a` is older but still queued, so the finished `b` goes.
        assert_eq!(evicted, vec![b_id]);
        assert!(store.slot(&a_id).is_some());
        assert!(store.slot(&c_id).is_some());
    }

    #[tokio::test]
    async fn over_capacity_without_terminal_jobs_keeps_everything() {
        let store = JobStore::new(1);
        store.insert(job()).await.unwrap();
        let evicted = store.insert(job()).await.unwrap();
        assert!(evicted.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn expired_terminal_jobs_are_swept() {
        let store = JobStore::new(10);
        let done = job();
        let pending = job();
        let (done_id, pending_id) = (done.id, pending.id);
        store.insert(done).await.unwrap();
        store.insert(pending).await.unwrap();
        finish(&store, &done_id).await;

        let far_past = Utc::now() - chrono::Duration::hours(1);
        assert!(store.evict_finished_before(far_past).await.is_empty());

        let future = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.evict_finished_before(future).await, vec![done_id]);
        assert!(store.slot(&pending_id).is_some());
        assert_eq!(store.snapshots_recent().await.len(), 1);
    }

    #[tokio::test]
    async fn locked_job_is_not_evicted() {
        let store = JobStore::new(10);
        let a = job();
        let id = a.id;
        store.insert(a).await.unwrap();
        finish(&store, &id).await;

        let slot = store.slot(&id).unwrap();
        let _guard = slot.lock().await;
        let future = Utc::now() + chrono::Duration::seconds(1);
        assert!(store.evict_finished_before(future).await.is_empty());
    }
}
