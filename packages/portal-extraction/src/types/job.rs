//! Mirror of the externally persisted job record.
//!
//! The job store owns these records; the engine only updates an existing
//! record it was given or one it just created, and never deletes one. A job
//! is finalized exactly once, to `completed` or `failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::Category;
use super::checkpoint::Checkpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// What the invocation is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Reconnaissance: fetch known pages and log structural extracts.
    Discover,
    /// Full extraction of the requested categories.
    Scrape,
}

/// One logical user-requested extraction, tracked across possibly many
/// continuation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mode: RunMode,
    pub data_types: Vec<Category>,
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing within a run. Held at or below
    /// 99 until finalization sets it to exactly 100 with the terminal
    /// status.
    pub progress: u8,
    pub error_message: Option<String>,
    /// Append-only newline-joined run log.
    pub log_output: Option<String>,
    /// Live checkpoint, at most one per job.
    pub batch_state: Option<Checkpoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a fresh running job.
    pub fn new(user_id: Uuid, mode: RunMode, data_types: Vec<Category>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            mode,
            data_types,
            status: JobStatus::Running,
            progress: 0,
            error_message: None,
            log_output: None,
            batch_state: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One produced artifact reference, persisted per category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub job_id: Uuid,
    pub category: Category,
    pub storage_path: String,
    pub row_count: usize,
}
