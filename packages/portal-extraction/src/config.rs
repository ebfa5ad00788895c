//! Engine configuration.

use std::time::Duration;

use crate::portal::EndpointCatalog;

/// Tunables for one engine instance.
///
/// Defaults match the live portal's observed behavior; tests compress the
/// timings to zero.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Endpoint catalog for the target deployment.
    pub endpoints: EndpointCatalog,

    /// Wall-clock budget for one invocation, leaving headroom under the
    /// hosting platform's hard execution ceiling.
    pub invocation_budget: Duration,

    /// Minimum spacing between portal requests. Zero disables pacing.
    pub request_spacing: Duration,

    /// Wait for asynchronous server-side report materialization.
    pub report_delay: Duration,

    /// Export polling schedule after a report trigger.
    pub poll_attempts: u32,
    pub poll_interval: Duration,

    /// Statement listing page size.
    pub statement_page_size: usize,

    /// Persist progress and log every this many per-patient units.
    pub progress_interval: usize,

    /// Window after which a job still `running` is reclaimed as failed.
    pub stale_after: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointCatalog::default(),
            invocation_budget: Duration::from_secs(100),
            request_spacing: Duration::from_millis(250),
            report_delay: Duration::from_secs(20),
            poll_attempts: 8,
            poll_interval: Duration::from_secs(4),
            statement_page_size: 100,
            progress_interval: 50,
            stale_after: Duration::from_secs(3600),
        }
    }
}

impl EngineConfig {
    /// Config pointed at a portal deployment.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            endpoints: EndpointCatalog::new(base_url),
            ..Self::default()
        }
    }

    pub fn with_endpoints(mut self, endpoints: EndpointCatalog) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_invocation_budget(mut self, budget: Duration) -> Self {
        self.invocation_budget = budget;
        self
    }

    pub fn with_request_spacing(mut self, spacing: Duration) -> Self {
        self.request_spacing = spacing;
        self
    }

    pub fn with_report_delay(mut self, delay: Duration) -> Self {
        self.report_delay = delay;
        self
    }

    pub fn with_poll_schedule(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    pub fn with_statement_page_size(mut self, size: usize) -> Self {
        self.statement_page_size = size;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_stale_after(mut self, window: Duration) -> Self {
        self.stale_after = window;
        self
    }

    /// Zero-delay variant for tests.
    pub fn for_tests(base_url: impl Into<String>) -> Self {
        Self::new(base_url)
            .with_request_spacing(Duration::ZERO)
            .with_report_delay(Duration::ZERO)
            .with_poll_schedule(8, Duration::ZERO)
    }
}
