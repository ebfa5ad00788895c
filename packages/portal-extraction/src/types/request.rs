//! Invocation request and response wire types.
//!
//! The `_continuation*` fields are present only on self-triggered
//! continuation calls and are otherwise absent from the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::Category;
use super::checkpoint::Checkpoint;
use super::job::RunMode;

/// Inbound extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub mode: RunMode,
    pub data_types: Vec<Category>,

    /// Optional `MM/DD/YYYY` lower bound for dated categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,

    /// Optional `MM/DD/YYYY` upper bound for dated categories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,

    /// Cap the patient roster for smoke tests against a live portal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_limit: Option<usize>,

    /// Restrict the roster to patients matching this name fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_patient_name: Option<String>,

    #[serde(
        rename = "_continuationJobId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub continuation_job_id: Option<Uuid>,

    #[serde(
        rename = "_continuationCheckpoint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub continuation_checkpoint: Option<Checkpoint>,

    #[serde(
        rename = "_continuationLog",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub continuation_log: Option<Vec<String>>,
}

impl ExtractionRequest {
    /// Plain scrape request for the given categories.
    pub fn scrape(data_types: Vec<Category>) -> Self {
        Self {
            mode: RunMode::Scrape,
            data_types,
            date_from: None,
            date_to: None,
            test_limit: None,
            test_patient_name: None,
            continuation_job_id: None,
            continuation_checkpoint: None,
            continuation_log: None,
        }
    }

    /// Discovery-mode request.
    pub fn discover() -> Self {
        Self {
            mode: RunMode::Discover,
            ..Self::scrape(Vec::new())
        }
    }

    pub fn with_date_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.date_from = Some(from.into());
        self.date_to = Some(to.into());
        self
    }

    pub fn is_continuation(&self) -> bool {
        self.continuation_job_id.is_some()
    }

    /// Derive the self-continuation request carrying the same original
    /// parameters plus the job identity, checkpoint, and accumulated log.
    pub fn into_continuation(
        mut self,
        job_id: Uuid,
        checkpoint: Checkpoint,
        log: Vec<String>,
    ) -> Self {
        self.continuation_job_id = Some(job_id);
        self.continuation_checkpoint = Some(checkpoint);
        self.continuation_log = Some(log);
        self
    }
}

/// Scrape parameters shared by every strategy in a run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub test_limit: Option<usize>,
    pub test_patient_name: Option<String>,
}

impl From<&ExtractionRequest> for ScrapeOptions {
    fn from(request: &ExtractionRequest) -> Self {
        Self {
            date_from: request.date_from.clone(),
            date_to: request.date_to.clone(),
            test_limit: request.test_limit,
            test_patient_name: request.test_patient_name.clone(),
        }
    }
}

/// Outbound invocation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub success: bool,
    pub job_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RunMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_data: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batching: Option<bool>,
}

impl ExtractionResponse {
    /// Response for a run that finalized in this invocation.
    pub fn finished(job_id: Uuid, mode: RunMode, has_data: bool) -> Self {
        Self {
            success: true,
            job_id,
            mode: Some(mode),
            has_data: Some(has_data),
            batching: None,
        }
    }

    /// Response for a run handed off to a continuation invocation.
    pub fn batching(job_id: Uuid, mode: RunMode) -> Self {
        Self {
            success: true,
            job_id,
            mode: Some(mode),
            has_data: None,
            batching: Some(true),
        }
    }
}
