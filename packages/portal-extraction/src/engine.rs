//! Run orchestration.
//!
//! One invocation: sweep stale jobs, load credentials, create or resume the
//! job, authenticate, then either run discovery or walk the requested
//! categories through their strategy chains, with the documents category
//! driven by the checkpointed batch runner. A deadline hit mid-category
//! persists a checkpoint and enqueues a continuation instead of finalizing;
//! everything else ends in exactly one terminal job update.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{BatchCursor, BatchOutcome, BatchRunner, Deadline};
use crate::config::EngineConfig;
use crate::discovery;
use crate::error::{EngineError, EngineResult};
use crate::log::RunLog;
use crate::output;
use crate::patients::PatientIndex;
use crate::portal::dates;
use crate::progress::ProgressReporter;
use crate::session::transport::PortalTransport;
use crate::session::{auth, SessionClient};
use crate::stores::{ContinuationQueue, CredentialStore, JobStore, ObjectStore};
use crate::strategies::documents::DocumentIndexTask;
use crate::strategies::{self, StrategyContext};
use crate::types::{
    Category, CategoryResult, Checkpoint, ExtractionRequest, ExtractionResponse, Job, ResultRecord,
    RunMode, ScrapeOptions, Table,
};

/// The engine's external collaborators.
pub struct EngineDeps {
    pub jobs: Arc<dyn JobStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub continuations: Arc<dyn ContinuationQueue>,
}

pub struct Engine {
    config: EngineConfig,
    transport: Arc<dyn PortalTransport>,
    deps: EngineDeps,
}

impl Engine {
    pub fn new(config: EngineConfig, transport: Arc<dyn PortalTransport>, deps: EngineDeps) -> Self {
        Self {
            config,
            transport,
            deps,
        }
    }

    /// Execute one invocation for a user.
    pub async fn run(
        &self,
        user_id: Uuid,
        request: ExtractionRequest,
    ) -> EngineResult<ExtractionResponse> {
        validate(&request)?;
        self.sweep_stale_jobs().await;

        let credentials = self
            .deps
            .credentials
            .get(user_id)
            .await?
            .ok_or(EngineError::MissingCredentials)?;

        let log = RunLog::from_lines(request.continuation_log.clone().unwrap_or_default());
        let job = self.create_or_resume_job(user_id, &request).await?;
        let job_id = job.id;
        let mode = request.mode;
        let reporter = ProgressReporter::new(self.deps.jobs.clone(), job, log.clone());

        log.push(if request.is_continuation() {
            "continuation run started"
        } else {
            "run started"
        });

        let session = SessionClient::new(self.transport.clone(), self.config.request_spacing);
        let deadline = Deadline::new(self.config.invocation_budget);

        if let Err(auth_err) = auth::login(&session, &self.config.endpoints, &credentials).await {
            log.push(format!("login failed: {auth_err}"));
            reporter.finalize_failed(auth_err.to_string()).await?;
            return Err(EngineError::Auth(auth_err));
        }
        log.push("authenticated with portal");

        if mode == RunMode::Discover {
            discovery::run(&session, &self.config, &log).await;
            reporter.finalize_completed(None).await?;
            return Ok(ExtractionResponse::finished(job_id, mode, false));
        }

        let options = ScrapeOptions::from(&request);
        let ctx = StrategyContext {
            session: &session,
            config: &self.config,
            options: &options,
            deadline,
            log: &log,
        };
        let patient_index = PatientIndex::new();

        let mut completed: Vec<CategoryResult> = Vec::new();
        let mut resume: Option<(Category, BatchCursor)> = None;
        if let Some(checkpoint) = request.continuation_checkpoint.clone() {
            log.push(format!(
                "resuming {} at patient {}",
                checkpoint.category, checkpoint.resume_index
            ));
            resume = Some((
                checkpoint.category,
                BatchCursor::from_checkpoint(&checkpoint),
            ));
            completed = checkpoint.completed;
            reporter.set_completed_categories(completed.len());
        }

        for category in request.data_types.clone() {
            if completed.iter().any(|r| r.category == category) {
                continue;
            }

            let table = if category.iterates_patients() {
                let cursor = match resume.take() {
                    Some((resumed, cursor)) if resumed == category => cursor,
                    other => {
                        resume = other;
                        BatchCursor::default()
                    }
                };

                let patients = match patient_index.get_or_fetch(&ctx).await {
                    Ok(patients) => patients,
                    Err(e) => {
                        warn!(category = %category, error = %e, "patient roster unavailable");
                        log.push(format!("{category}: patient roster unavailable ({e})"));
                        &[]
                    }
                };

                let runner = BatchRunner::new(deadline, self.config.progress_interval);
                let task = DocumentIndexTask::new(&ctx, self.deps.objects.as_ref(), job_id);
                match runner
                    .run(category, patients, cursor, &task, &reporter)
                    .await
                {
                    BatchOutcome::Completed(table) => table,
                    BatchOutcome::Checkpointed(cursor) => {
                        return self
                            .hand_off(category, cursor, completed, &request, &reporter)
                            .await;
                    }
                }
            } else {
                let chain = strategies::chain_for(category);
                strategies::run_chain(category, &chain, &ctx).await
            };

            completed.push(CategoryResult::new(category, table));
            reporter.category_complete().await;
        }

        self.finish(job_id, mode, completed, &reporter).await
    }

    /// Persist the checkpoint, enqueue the continuation, and return without
    /// finalizing the job.
    async fn hand_off(
        &self,
        category: Category,
        cursor: BatchCursor,
        completed: Vec<CategoryResult>,
        request: &ExtractionRequest,
        reporter: &ProgressReporter,
    ) -> EngineResult<ExtractionResponse> {
        let job_id = reporter.job_id();
        let checkpoint = Checkpoint {
            category,
            resume_index: cursor.resume_index,
            counters: cursor.counters,
            partial: Table { rows: cursor.rows },
            completed,
        };
        reporter.save_checkpoint(&checkpoint).await?;

        let continuation =
            request
                .clone()
                .into_continuation(job_id, checkpoint, reporter.log().lines());
        if let Err(e) = self.deps.continuations.enqueue(continuation).await {
            warn!(job_id = %job_id, error = %e, "continuation enqueue failed");
            reporter
                .log()
                .push(format!("continuation enqueue failed: {e}"));
            reporter.flush_log().await;
        } else {
            reporter.log().push("checkpoint saved, continuation queued");
            reporter.flush_log().await;
        }

        Ok(ExtractionResponse::batching(job_id, request.mode))
    }

    /// Assemble output, record results, and finalize the job.
    async fn finish(
        &self,
        job_id: Uuid,
        mode: RunMode,
        completed: Vec<CategoryResult>,
        reporter: &ProgressReporter,
    ) -> EngineResult<ExtractionResponse> {
        let log = reporter.log();
        for result in &completed {
            log.push(format!("{}: {} rows", result.category, result.row_count()));
        }

        let has_data = completed.iter().any(|r| !r.table.is_empty());
        if has_data {
            if let Some(storage_path) =
                output::assemble_and_upload(job_id, &completed, self.deps.objects.as_ref(), log)
                    .await
            {
                for result in completed.iter().filter(|r| !r.table.is_empty()) {
                    let record = ResultRecord {
                        job_id,
                        category: result.category,
                        storage_path: storage_path.clone(),
                        row_count: result.row_count(),
                    };
                    if let Err(e) = self.deps.jobs.insert_result(&record).await {
                        warn!(job_id = %job_id, error = %e, "result record insert failed");
                    }
                }
            }
        }

        let advisory = if has_data {
            None
        } else {
            Some("run completed but no rows were found; check the log".to_string())
        };
        reporter.finalize_completed(advisory).await?;
        info!(job_id = %job_id, has_data, "run finalized");

        Ok(ExtractionResponse::finished(job_id, mode, has_data))
    }

    async fn create_or_resume_job(
        &self,
        user_id: Uuid,
        request: &ExtractionRequest,
    ) -> EngineResult<Job> {
        match request.continuation_job_id {
            Some(id) => self
                .deps
                .jobs
                .find(id)
                .await?
                .ok_or(EngineError::UnknownJob { job_id: id }),
            None => {
                let job = Job::new(user_id, request.mode, request.data_types.clone());
                self.deps.jobs.create(&job).await?;
                Ok(job)
            }
        }
    }

    /// Reclaim jobs left `running` past the staleness window before
    /// starting a new run. Best-effort.
    async fn sweep_stale_jobs(&self) {
        let window = chrono::Duration::from_std(self.config.stale_after)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        match self.deps.jobs.reclaim_stale(window).await {
            Ok(0) => {}
            Ok(reclaimed) => info!(reclaimed, "reclaimed stale running jobs"),
            Err(e) => warn!(error = %e, "stale job sweep failed"),
        }
    }
}

fn validate(request: &ExtractionRequest) -> EngineResult<()> {
    if request.mode == RunMode::Scrape && request.data_types.is_empty() {
        return Err(EngineError::InvalidRequest {
            reason: "no data types requested".to_string(),
        });
    }
    for (label, value) in [
        ("dateFrom", &request.date_from),
        ("dateTo", &request.date_to),
    ] {
        if let Some(value) = value {
            if dates::parse_portal_date(value).is_none() {
                return Err(EngineError::InvalidRequest {
                    reason: format!("{label} is not an MM/DD/YYYY date: {value}"),
                });
            }
        }
    }
    if request.continuation_checkpoint.is_some() && request.continuation_job_id.is_none() {
        return Err(EngineError::InvalidRequest {
            reason: "checkpoint without a continuation job id".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_without_categories_is_invalid() {
        let request = ExtractionRequest::scrape(Vec::new());
        assert!(matches!(
            validate(&request),
            Err(EngineError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn discovery_without_categories_is_fine() {
        assert!(validate(&ExtractionRequest::discover()).is_ok());
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let request = ExtractionRequest::scrape(vec![Category::Appointments])
            .with_date_range("2026-01-01", "01/31/2026");
        assert!(matches!(
            validate(&request),
            Err(EngineError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn orphan_checkpoints_are_rejected() {
        let mut request = ExtractionRequest::scrape(vec![Category::Documents]);
        request.continuation_checkpoint = Some(Checkpoint {
            category: Category::Documents,
            resume_index: 1,
            counters: Default::default(),
            partial: Default::default(),
            completed: Vec::new(),
        });
        assert!(matches!(
            validate(&request),
            Err(EngineError::InvalidRequest { .. })
        ));
    }
}
