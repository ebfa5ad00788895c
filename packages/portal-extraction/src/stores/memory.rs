//! In-memory store implementations for testing and development.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::types::{ExtractionRequest, Job, JobStatus, PortalCredentials, ResultRecord};

use super::{ContinuationQueue, CredentialStore, JobStore, ObjectStore};

/// In-memory job store.
///
/// Also records every persisted progress value, which the monotonicity
/// tests rely on.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    results: RwLock<Vec<ResultRecord>>,
    progress_history: RwLock<HashMap<Uuid, Vec<u8>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().unwrap().get(&id).cloned()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.read().unwrap().values().cloned().collect()
    }

    pub fn results(&self) -> Vec<ResultRecord> {
        self.results.read().unwrap().clone()
    }

    /// Every persisted progress value for a job, in write order.
    pub fn progress_history(&self, id: Uuid) -> Vec<u8> {
        self.progress_history
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    fn record_progress(&self, job: &Job) {
        self.progress_history
            .write()
            .unwrap()
            .entry(job.id)
            .or_default()
            .push(job.progress);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        self.jobs.write().unwrap().insert(job.id, job.clone());
        self.record_progress(job);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    async fn update(&self, job: &Job) -> StoreResult<()> {
        let mut stored = job.clone();
        stored.updated_at = Utc::now();
        self.jobs.write().unwrap().insert(stored.id, stored);
        self.record_progress(job);
        Ok(())
    }

    async fn reclaim_stale(&self, older_than: Duration) -> StoreResult<usize> {
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.write().unwrap();
        let mut reclaimed = 0;

        for job in jobs.values_mut() {
            if job.status == JobStatus::Running && job.updated_at < cutoff {
                job.status = JobStatus::Failed;
                job.error_message = Some("run exceeded the staleness window".to_string());
                job.updated_at = Utc::now();
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn insert_result(&self, result: &ResultRecord) -> StoreResult<()> {
        self.results.write().unwrap().push(result.clone());
        Ok(())
    }
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<HashMap<Uuid, PortalCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: Uuid, credentials: PortalCredentials) {
        self.credentials
            .write()
            .unwrap()
            .insert(user_id, credentials);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: Uuid) -> StoreResult<Option<PortalCredentials>> {
        Ok(self.credentials.read().unwrap().get(&user_id).cloned())
    }
}

/// In-memory object store with an optional failure toggle for upload-error
/// tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.read().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.read().unwrap().keys().cloned().collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> StoreResult<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Object("simulated upload failure".to_string()));
        }
        self.objects
            .write()
            .unwrap()
            .insert(path.to_string(), bytes);
        Ok(path.to_string())
    }
}

/// In-memory continuation queue.
#[derive(Default)]
pub struct MemoryContinuationQueue {
    queued: RwLock<Vec<ExtractionRequest>>,
}

impl MemoryContinuationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queued.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.read().unwrap().is_empty()
    }

    /// Take every queued continuation, clearing the queue.
    pub fn drain(&self) -> Vec<ExtractionRequest> {
        std::mem::take(&mut *self.queued.write().unwrap())
    }
}

#[async_trait]
impl ContinuationQueue for MemoryContinuationQueue {
    async fn enqueue(&self, request: ExtractionRequest) -> StoreResult<()> {
        self.queued.write().unwrap().push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, RunMode};

    #[tokio::test]
    async fn job_round_trip() {
        let store = MemoryJobStore::new();
        let job = Job::new(Uuid::new_v4(), RunMode::Scrape, vec![Category::Demographics]);
        store.create(&job).await.unwrap();

        let found = store.find(job.id).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert_eq!(found.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn reclaim_fails_only_stale_running_jobs() {
        let store = MemoryJobStore::new();

        let mut stale = Job::new(Uuid::new_v4(), RunMode::Scrape, vec![]);
        stale.updated_at = Utc::now() - Duration::hours(2);
        let mut fresh = Job::new(Uuid::new_v4(), RunMode::Scrape, vec![]);
        fresh.updated_at = Utc::now();
        let mut done = Job::new(Uuid::new_v4(), RunMode::Scrape, vec![]);
        done.status = JobStatus::Completed;
        done.updated_at = Utc::now() - Duration::hours(2);

        for job in [&stale, &fresh, &done] {
            store.jobs.write().unwrap().insert(job.id, (*job).clone());
        }

        let reclaimed = store.reclaim_stale(Duration::hours(1)).await.unwrap();
        assert_eq!(reclaimed, 1);
        assert_eq!(store.get(stale.id).unwrap().status, JobStatus::Failed);
        assert_eq!(store.get(fresh.id).unwrap().status, JobStatus::Running);
        assert_eq!(store.get(done.id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn object_store_failure_toggle() {
        let store = MemoryObjectStore::new();
        store.put("a/b.xlsx", vec![1, 2], "application/x").await.unwrap();
        assert_eq!(store.object_count(), 1);

        store.fail_puts(true);
        let err = store.put("a/c.xlsx", vec![3], "application/x").await;
        assert!(err.is_err());
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn continuation_queue_drains_in_order() {
        let queue = MemoryContinuationQueue::new();
        queue
            .enqueue(ExtractionRequest::scrape(vec![Category::Documents]))
            .await
            .unwrap();
        assert_eq!(queue.len(), 1);
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
    }
}
