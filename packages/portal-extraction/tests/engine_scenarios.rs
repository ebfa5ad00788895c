//! End-to-end engine scenarios against a scripted portal and in-memory
//! stores.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use portal_extraction::testing::{portal_with_login, MockTransport};
use portal_extraction::{
    Category, Engine, EngineConfig, EngineDeps, EngineError, ExtractionRequest, JobStatus,
    MemoryContinuationQueue, MemoryCredentialStore, MemoryJobStore, MemoryObjectStore,
    PortalCredentials, RunMode,
};

struct Harness {
    engine: Engine,
    transport: Arc<MockTransport>,
    jobs: Arc<MemoryJobStore>,
    objects: Arc<MemoryObjectStore>,
    continuations: Arc<MemoryContinuationQueue>,
    user_id: Uuid,
}

impl Harness {
    fn new(transport: MockTransport, config: EngineConfig) -> Self {
        let transport = Arc::new(transport);
        let jobs = Arc::new(MemoryJobStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let continuations = Arc::new(MemoryContinuationQueue::new());
        let credentials = Arc::new(MemoryCredentialStore::new());

        let user_id = Uuid::new_v4();
        credentials.insert(user_id, PortalCredentials::new("frontdesk", "hunter2"));

        let deps = EngineDeps {
            jobs: jobs.clone(),
            credentials,
            objects: objects.clone(),
            continuations: continuations.clone(),
        };
        Self {
            engine: Engine::new(config, transport.clone(), deps),
            transport,
            jobs,
            objects,
            continuations,
            user_id,
        }
    }

    fn with_defaults(transport: MockTransport) -> Self {
        Self::new(transport, EngineConfig::for_tests("https://portal.test"))
    }
}

fn export_payload(rows: usize) -> String {
    let mut payload = String::from("Id,First,Last,DOB\n");
    for i in 0..rows {
        payload.push_str(&format!("{i},First{i},Last{i},01/15/199{}\n", i % 10));
    }
    payload
}

fn roster_json(count: usize) -> serde_json::Value {
    let patients: Vec<_> = (0..count)
        .map(|i| json!({"id": i, "firstName": format!("First{i}"), "lastName": format!("Last{i}")}))
        .collect();
    json!({ "rows": patients })
}

#[tokio::test]
async fn demographics_happy_path_yields_rows_and_a_workbook() {
    let harness = Harness::with_defaults(
        portal_with_login().with_page("/reports/patients/export", &export_payload(12)),
    );

    let response = harness
        .engine
        .run(
            harness.user_id,
            ExtractionRequest::scrape(vec![Category::Demographics]),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.has_data, Some(true));
    assert_eq!(response.batching, None);

    // row count is body lines minus the header
    let results = harness.jobs.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].category, Category::Demographics);
    assert_eq!(results[0].row_count, 12);

    // a single workbook artifact was stored
    assert_eq!(harness.objects.object_count(), 1);
    let bytes = harness.objects.get(&results[0].storage_path).unwrap();
    assert_eq!(&bytes[..2], b"PK");

    let job = harness.jobs.get(response.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.error_message.is_none());
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_exactly_100() {
    let harness = Harness::with_defaults(
        portal_with_login()
            .with_page("/reports/patients/export", &export_payload(5))
            .with_json("/ajax/providers", json!([{"id": 1}]))
            .with_page("/reports/schedule/generate", &export_payload(5))
            .with_json("/ajax/billing/statements", json!({"rows": [], "total": 0})),
    );

    let response = harness
        .engine
        .run(
            harness.user_id,
            ExtractionRequest::scrape(vec![
                Category::Demographics,
                Category::Appointments,
                Category::Financials,
            ]),
        )
        .await
        .unwrap();

    let history = harness.jobs.progress_history(response.job_id);
    let mut sorted = history.clone();
    sorted.sort_unstable();
    assert_eq!(history, sorted, "progress must never decrease");
    assert_eq!(*history.last().unwrap(), 100);
    assert!(history[..history.len() - 1].iter().all(|p| *p <= 99));
}

#[tokio::test]
async fn exhausted_chains_complete_with_no_data_and_an_advisory() {
    // no category endpoint is wired; every strategy sees 404s
    let harness = Harness::with_defaults(portal_with_login());

    let response = harness
        .engine
        .run(
            harness.user_id,
            ExtractionRequest::scrape(vec![Category::Demographics, Category::Financials]),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.has_data, Some(false));

    let job = harness.jobs.get(response.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.error_message.unwrap().contains("no rows"));
    assert_eq!(harness.objects.object_count(), 0);
    assert!(harness.jobs.results().is_empty());
}

#[tokio::test]
async fn authentication_failure_fails_the_job_and_stops() {
    let transport = MockTransport::new()
        .with_page("/login", "<html></html>")
        .with_page("/login/validate", "invalid_credentials");
    let harness = Harness::with_defaults(transport);

    let err = harness
        .engine
        .run(
            harness.user_id,
            ExtractionRequest::scrape(vec![Category::Demographics]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Auth(_)));

    // the job was finalized as failed with the classified message
    let jobs = harness.jobs.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("rejected the stored credentials"));
    assert!(jobs[0].progress < 100);

    // no category endpoint was ever probed
    assert_eq!(harness.transport.calls_to("/reports/patients/export"), 0);
    assert!(harness.jobs.results().is_empty());
}

#[tokio::test]
async fn missing_credentials_error_before_any_job_exists() {
    let harness = Harness::with_defaults(portal_with_login());
    let stranger = Uuid::new_v4();

    let err = harness
        .engine
        .run(
            stranger,
            ExtractionRequest::scrape(vec![Category::Demographics]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingCredentials));
    assert_eq!(harness.transport.call_count(), 0);
}

#[tokio::test]
async fn discovery_mode_logs_sections_and_writes_no_results() {
    let harness = Harness::with_defaults(portal_with_login());

    let response = harness
        .engine
        .run(harness.user_id, ExtractionRequest::discover())
        .await
        .unwrap();
    assert_eq!(response.mode, Some(RunMode::Discover));

    let job = harness.jobs.get(response.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(harness.jobs.results().is_empty());
    assert_eq!(harness.objects.object_count(), 0);

    let log = job.log_output.unwrap();
    for section in ["login", "dashboard", "patients", "scheduler", "reports", "billing"] {
        assert!(log.contains(&format!("=== {section} ===")), "missing {section}");
    }
}

/// Wire a portal where every patient has a chart to export.
fn documents_portal(patients: usize) -> MockTransport {
    portal_with_login()
        .with_json("/ajax/patients/list", roster_json(patients))
        .with_json(
            "/ajax/patients/search",
            json!([{"patientId": "p", "caseId": "c", "caseName": "Chart"}]),
        )
        .with_page("/ajax/session/set-patient", "ok")
        .with_json(
            "/ajax/documents/list",
            json!([{"id": "f1", "name": "chart.pdf"}]),
        )
        .with_page("/ajax/documents/export", &"pdfbytes".repeat(20))
}

#[tokio::test]
async fn deadline_checkpoints_and_continuations_cover_every_patient_once() {
    let patient_count = 6;
    let config = EngineConfig::for_tests("https://portal.test")
        .with_invocation_budget(Duration::from_millis(120))
        .with_progress_interval(2);
    let transport = documents_portal(patient_count).with_latency(Duration::from_millis(8));
    let harness = Harness::new(transport, config);

    let request = ExtractionRequest::scrape(vec![Category::Documents]);
    let mut response = harness
        .engine
        .run(harness.user_id, request)
        .await
        .unwrap();

    // the first invocation cannot finish the roster in budget
    assert_eq!(response.batching, Some(true));
    let job_id = response.job_id;

    let job = harness.jobs.get(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Running);
    let checkpoint = job.batch_state.expect("checkpoint must be persisted");
    assert_eq!(checkpoint.category, Category::Documents);
    // resume index equals the number of patients actually processed
    assert_eq!(
        checkpoint.resume_index,
        harness.transport.calls_to("/ajax/patients/search")
    );
    assert!(checkpoint.resume_index < patient_count);

    // drive the continuation chain to completion
    let mut rounds = 0;
    while response.batching == Some(true) {
        rounds += 1;
        assert!(rounds < 20, "continuation chain did not converge");

        let queued = harness.continuations.drain();
        assert_eq!(queued.len(), 1, "exactly one continuation per handoff");
        let continuation = queued.into_iter().next().unwrap();
        assert_eq!(continuation.continuation_job_id, Some(job_id));

        response = harness
            .engine
            .run(harness.user_id, continuation)
            .await
            .unwrap();
        assert_eq!(response.job_id, job_id);
    }

    // finalized with every patient processed exactly once
    assert_eq!(response.has_data, Some(true));
    let job = harness.jobs.get(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.batch_state.is_none(), "checkpoint consumed");

    assert_eq!(
        harness.transport.calls_to("/ajax/patients/search"),
        patient_count,
        "every patient searched exactly once across all runs"
    );

    let results = harness.jobs.results();
    let documents = results
        .iter()
        .find(|r| r.category == Category::Documents)
        .unwrap();
    assert_eq!(documents.row_count, patient_count);
}

#[tokio::test]
async fn stale_running_jobs_are_reclaimed_before_a_new_run() {
    let harness = Harness::new(
        portal_with_login().with_page("/reports/patients/export", &export_payload(2)),
        EngineConfig::for_tests("https://portal.test").with_stale_after(Duration::from_secs(0)),
    );

    // an earlier invocation that crashed without finalizing
    let orphan = portal_extraction::Job::new(
        harness.user_id,
        RunMode::Scrape,
        vec![Category::Documents],
    );
    use portal_extraction::JobStore as _;
    harness.jobs.create(&orphan).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    harness
        .engine
        .run(
            harness.user_id,
            ExtractionRequest::scrape(vec![Category::Demographics]),
        )
        .await
        .unwrap();

    let reclaimed = harness.jobs.get(orphan.id).unwrap();
    assert_eq!(reclaimed.status, JobStatus::Failed);
    assert!(reclaimed.error_message.unwrap().contains("staleness"));
}

#[tokio::test]
async fn unknown_continuation_job_is_rejected() {
    let harness = Harness::with_defaults(portal_with_login());

    let mut request = ExtractionRequest::scrape(vec![Category::Documents]);
    request.continuation_job_id = Some(Uuid::new_v4());
    request.continuation_log = Some(vec!["carried".to_string()]);

    let err = harness
        .engine
        .run(harness.user_id, request)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownJob { .. }));
}
