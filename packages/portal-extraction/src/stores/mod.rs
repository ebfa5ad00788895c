//! The engine's external collaborators.
//!
//! The engine never owns persistence: the job record, the stored portal
//! credentials, the delivered artifacts, and the continuation mechanism all
//! live behind these traits. `memory` provides the reference
//! implementations used by tests and development.

pub mod memory;

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{ExtractionRequest, Job, PortalCredentials, ResultRecord};

/// Persistence for job records.
///
/// The engine only updates an existing job it was given or one it just
/// created; it never deletes one.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> StoreResult<()>;

    async fn find(&self, id: Uuid) -> StoreResult<Option<Job>>;

    async fn update(&self, job: &Job) -> StoreResult<()>;

    /// Fail jobs stuck in `running` longer than the window, guarding
    /// against invocations that crashed without finalizing. Returns the
    /// number reclaimed.
    async fn reclaim_stale(&self, older_than: Duration) -> StoreResult<usize>;

    async fn insert_result(&self, result: &ResultRecord) -> StoreResult<()>;
}

/// Read-only access to stored portal credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> StoreResult<Option<PortalCredentials>>;
}

/// Object storage for delivered artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes and return the storage path the dashboard can link to.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<String>;
}

/// Fire-and-forget handoff to the external execution service.
///
/// Enqueued requests re-enter the engine as continuation invocations; the
/// enqueue itself is an asynchronous task submission, not a self-call.
#[async_trait]
pub trait ContinuationQueue: Send + Sync {
    async fn enqueue(&self, request: ExtractionRequest) -> StoreResult<()>;
}
