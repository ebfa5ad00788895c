//! Deadline-checked per-patient batch loop.
//!
//! Categories that walk the patient roster can outlive the hosting
//! platform's execution ceiling. The runner checks a wall-clock deadline
//! before every unit of work; when the budget is gone it hands back a
//! cursor for the caller to checkpoint and continue in a fresh invocation.
//! State machine per category: Starting -> Iterating -> Completed |
//! Checkpointed.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::PortalResult;
use crate::progress::ProgressReporter;
use crate::types::{Category, CategoryCounters, Checkpoint, PatientRecord, Row, Table};

/// Wall-clock budget for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start the clock now.
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }
}

/// Where a per-patient loop stands: next index, counters, rows so far.
#[derive(Debug, Clone, Default)]
pub struct BatchCursor {
    pub resume_index: usize,
    pub counters: CategoryCounters,
    pub rows: Vec<Row>,
}

impl BatchCursor {
    /// Resume position carried in a checkpoint.
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            resume_index: checkpoint.resume_index,
            counters: checkpoint.counters,
            rows: checkpoint.partial.rows.clone(),
        }
    }
}

/// How a batch loop ended.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The roster was exhausted within budget.
    Completed(Table),
    /// The deadline hit first; checkpoint and continue elsewhere.
    Checkpointed(BatchCursor),
}

/// One unit of per-patient work.
#[async_trait]
pub trait PatientTask: Send + Sync {
    /// Process one patient. `Ok(None)` means "nothing to record" (skipped,
    /// not found); errors are logged by the runner and the loop continues.
    async fn process(
        &self,
        patient: &PatientRecord,
        counters: &mut CategoryCounters,
    ) -> PortalResult<Option<Row>>;
}

pub struct BatchRunner {
    deadline: Deadline,
    progress_interval: usize,
}

impl BatchRunner {
    pub fn new(deadline: Deadline, progress_interval: usize) -> Self {
        Self {
            deadline,
            progress_interval,
        }
    }

    /// Drive the loop from the cursor until the roster is exhausted or the
    /// deadline hits.
    pub async fn run<T: PatientTask + ?Sized>(
        &self,
        category: Category,
        patients: &[PatientRecord],
        cursor: BatchCursor,
        task: &T,
        reporter: &ProgressReporter,
    ) -> BatchOutcome {
        let total = patients.len();
        let mut counters = cursor.counters;
        let mut rows = cursor.rows;

        if cursor.resume_index > 0 {
            info!(
                category = %category,
                resume_index = cursor.resume_index,
                total,
                "resuming batch from checkpoint"
            );
        }

        for index in cursor.resume_index..total {
            if self.deadline.exceeded() {
                reporter.log().push(format!(
                    "{category}: invocation budget reached at patient {index} of {total}"
                ));
                return BatchOutcome::Checkpointed(BatchCursor {
                    resume_index: index,
                    counters,
                    rows,
                });
            }

            let patient = &patients[index];
            match task.process(patient, &mut counters).await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => {}
                Err(e) => {
                    warn!(patient = %patient.search_name(), error = %e, "patient unit failed");
                    reporter
                        .log()
                        .push(format!("{category}: {} failed: {e}", patient.search_name()));
                }
            }

            let done = index + 1;
            if self.progress_interval > 0 && done % self.progress_interval == 0 {
                reporter.batch_progress(done, total).await;
            }
        }

        info!(
            category = %category,
            rows = rows.len(),
            documents = counters.documents_found,
            skipped = counters.patients_skipped,
            misses = counters.search_failures,
            "batch completed"
        );
        BatchOutcome::Completed(Table { rows })
    }
}
