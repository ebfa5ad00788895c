//! Session-Authenticated Practice Portal Extraction Engine
//!
//! A checkpointable pipeline for pulling structured records (patient
//! demographics, appointments, clinical document indexes, billing
//! statements) out of a practice-management web portal that exposes no
//! public API: every access goes through the portal's authenticated
//! HTML/AJAX surface.
//!
//! # Design
//!
//! - Session first: a cookie-jar client with browser headers, manual
//!   redirect following, and paced requests ([`session`])
//! - Per category, an ordered chain of endpoint strategies, cheapest
//!   first, short-circuiting on the first success ([`strategies`])
//! - Per-patient loops run under a wall-clock deadline and survive the
//!   hosting platform's execution ceiling by checkpointing and triggering
//!   their own continuation ([`batch`])
//! - External collaborators (job record, credentials, object storage,
//!   continuation queue) live behind traits ([`stores`])
//! - Results consolidate into one multi-sheet workbook ([`output`])
//!
//! # Usage
//!
//! ```rust,ignore
//! use portal_extraction::{Engine, EngineConfig, EngineDeps, ExtractionRequest, Category};
//! use portal_extraction::session::transport::HttpTransport;
//! use std::sync::Arc;
//!
//! let engine = Engine::new(
//!     EngineConfig::new("https://tenant.portal.example"),
//!     Arc::new(HttpTransport::new()),
//!     deps,
//! );
//! let response = engine
//!     .run(user_id, ExtractionRequest::scrape(vec![Category::Demographics]))
//!     .await?;
//! ```

pub mod batch;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod log;
pub mod output;
pub mod patients;
pub mod portal;
pub mod progress;
pub mod session;
pub mod stores;
pub mod strategies;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use config::EngineConfig;
pub use engine::{Engine, EngineDeps};
pub use error::{AuthError, EngineError, ParseError, PortalError, StoreError};
pub use types::{
    Category, CategoryCounters, CategoryResult, Checkpoint, ExtractionRequest, ExtractionResponse,
    Job, JobStatus, PatientRecord, PortalCredentials, ResultRecord, Row, RunMode, ScrapeOptions,
    Secret, Table,
};

// Re-export the pieces the engine is assembled from
pub use batch::{BatchCursor, BatchOutcome, BatchRunner, Deadline, PatientTask};
pub use log::RunLog;
pub use patients::PatientIndex;
pub use portal::EndpointCatalog;
pub use progress::ProgressReporter;
pub use session::transport::{HttpTransport, PortalTransport};
pub use session::{SessionClient, SessionState};
pub use stores::memory::{
    MemoryContinuationQueue, MemoryCredentialStore, MemoryJobStore, MemoryObjectStore,
};
pub use stores::{ContinuationQueue, CredentialStore, JobStore, ObjectStore};
pub use strategies::{Outcome, Strategy, StrategyContext};
