//! Job progress and log persistence.
//!
//! All job-record mutation for a run flows through the reporter: progress
//! percentages, log flushes, checkpoint saves, and the single terminal
//! update. Percent is `completed * (100/total) + partial share`, clamped to
//! 99 until finalization sets exactly 100 atomically with the terminal
//! status. Routine persistence is best-effort: failures are logged locally
//! and never abort the run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::log::RunLog;
use crate::stores::JobStore;
use crate::types::{Checkpoint, Job, JobStatus};

pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    job: Mutex<Job>,
    log: RunLog,
    total_categories: usize,
    completed_categories: AtomicUsize,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, job: Job, log: RunLog) -> Self {
        let total_categories = job.data_types.len().max(1);
        Self {
            store,
            job: Mutex::new(job),
            log,
            total_categories,
            completed_categories: AtomicUsize::new(0),
        }
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn job_id(&self) -> Uuid {
        self.job.lock().unwrap().id
    }

    pub fn snapshot(&self) -> Job {
        self.job.lock().unwrap().clone()
    }

    /// Seed the completed count when resuming from a checkpoint.
    pub fn set_completed_categories(&self, completed: usize) {
        self.completed_categories.store(completed, Ordering::SeqCst);
    }

    /// Percent for the current completed count plus a fraction of the
    /// in-flight category, clamped to 99.
    fn percent(&self, partial_fraction: f64) -> u8 {
        let share = 100.0 / self.total_categories as f64;
        let completed = self.completed_categories.load(Ordering::SeqCst) as f64;
        let percent = completed * share + partial_fraction.clamp(0.0, 1.0) * share;
        (percent.floor() as u8).min(99)
    }

    /// Report partial progress inside a per-patient loop.
    pub async fn batch_progress(&self, done: usize, total_units: usize) {
        let fraction = if total_units == 0 {
            1.0
        } else {
            done as f64 / total_units as f64
        };
        self.persist_progress(self.percent(fraction)).await;
    }

    /// Mark one category finished and report the new baseline.
    pub async fn category_complete(&self) {
        self.completed_categories.fetch_add(1, Ordering::SeqCst);
        self.persist_progress(self.percent(0.0)).await;
    }

    /// Best-effort progress + log persistence. Progress never decreases.
    async fn persist_progress(&self, percent: u8) {
        let snapshot = {
            let mut job = self.job.lock().unwrap();
            if percent > job.progress {
                job.progress = percent;
            }
            job.log_output = Some(self.log.joined());
            job.clone()
        };
        if let Err(e) = self.store.update(&snapshot).await {
            warn!(job_id = %snapshot.id, error = %e, "progress persistence failed");
        }
    }

    /// Flush the log without touching progress (best-effort).
    pub async fn flush_log(&self) {
        let snapshot = {
            let mut job = self.job.lock().unwrap();
            job.log_output = Some(self.log.joined());
            job.clone()
        };
        if let Err(e) = self.store.update(&snapshot).await {
            warn!(job_id = %snapshot.id, error = %e, "log flush failed");
        }
    }

    /// Persist a checkpoint ahead of a continuation handoff. The job stays
    /// `running`; this write must succeed for the handoff to be safe.
    pub async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> StoreResult<()> {
        let snapshot = {
            let mut job = self.job.lock().unwrap();
            job.batch_state = Some(checkpoint.clone());
            job.log_output = Some(self.log.joined());
            job.clone()
        };
        self.store.update(&snapshot).await
    }

    /// Terminal update: exactly 100 and `completed` in one write. An
    /// advisory message distinguishes "ran, but found nothing" from
    /// failure.
    pub async fn finalize_completed(&self, advisory: Option<String>) -> StoreResult<()> {
        let snapshot = {
            let mut job = self.job.lock().unwrap();
            job.progress = 100;
            job.status = JobStatus::Completed;
            job.error_message = advisory;
            job.batch_state = None;
            job.log_output = Some(self.log.joined());
            job.clone()
        };
        self.store.update(&snapshot).await
    }

    /// Terminal update for a run that could not proceed.
    pub async fn finalize_failed(&self, message: String) -> StoreResult<()> {
        let snapshot = {
            let mut job = self.job.lock().unwrap();
            job.status = JobStatus::Failed;
            job.error_message = Some(message);
            job.batch_state = None;
            job.log_output = Some(self.log.joined());
            job.clone()
        };
        self.store.update(&snapshot).await
    }
}
