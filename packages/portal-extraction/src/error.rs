//! Typed errors for the extraction engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only `AuthError` and request-validation failures abort a run. Transport,
//! parse, and upload errors are logged at their site and degrade to "zero
//! rows for this category"; the run still finalizes as completed.

use thiserror::Error;
use uuid::Uuid;

/// Errors that abort a run before or during orchestration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Portal authentication failed; the job is finalized as failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// No stored portal credentials for the requesting user.
    #[error("no portal credentials stored for this user")]
    MissingCredentials,

    /// Malformed or unsupported invocation request.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A continuation named a job the store does not know.
    #[error("unknown continuation job: {job_id}")]
    UnknownJob { job_id: Uuid },

    /// External store failure that could not be degraded.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Classified login failures. Fatal for the run, never retried.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The portal rejected the username/password pair.
    #[error("the portal rejected the stored credentials")]
    InvalidCredentials,

    /// The portal account is blocked.
    #[error("the portal account is blocked")]
    Blocked,

    /// The portal account is paused.
    #[error("the portal account is paused")]
    Paused,

    /// The portal could not be reached during login.
    #[error("portal unreachable during login: {0}")]
    Portal(#[source] PortalError),
}

/// Transient portal transport/protocol errors.
///
/// On a single strategy attempt these are logged and treated as "no data";
/// they never propagate as run-fatal.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Underlying HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The portal answered with an unusable status code.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Redirect chain exceeded the hop bound.
    #[error("too many redirects starting at {url}")]
    TooManyRedirects { url: String },

    /// A redirect response carried no location header.
    #[error("redirect without a location header from {url}")]
    MissingRedirectTarget { url: String },

    /// A URL could not be parsed or resolved.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Payload did not have the expected shape.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Unexpected payload shapes from portal endpoints.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Payload was readable but not shaped as expected.
    #[error("unexpected payload shape: {reason}")]
    UnexpectedShape { reason: String },

    /// A required field was absent.
    #[error("missing field: {field}")]
    MissingField { field: String },

    /// JSON deserialization failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures from the external stores the engine collaborates with.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Job record persistence failed.
    #[error("job store failure: {0}")]
    Job(String),

    /// Object storage write failed.
    #[error("object store failure: {0}")]
    Object(String),

    /// Workbook assembly failed before upload.
    #[error("workbook assembly failed: {0}")]
    Artifact(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for portal requests.
pub type PortalResult<T> = std::result::Result<T, PortalError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
