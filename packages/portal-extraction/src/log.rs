//! Append-only run log.
//!
//! Everything a dashboard user should see about a run lands here as well as
//! in `tracing`. The log is periodically flushed to the job record and
//! carried across continuation invocations as plain lines.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Shared append-only log for one run.
#[derive(Clone, Default)]
pub struct RunLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a log carried over from a prior invocation.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
        }
    }

    /// Append a timestamped line.
    pub fn push(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{message}");
        let line = format!("[{}] {}", Utc::now().format("%H:%M:%S"), message);
        self.lines.lock().unwrap().push(line);
    }

    /// Append a section header (discovery mode structures its output with
    /// these).
    pub fn push_section(&self, title: impl AsRef<str>) {
        self.push(format!("=== {} ===", title.as_ref()));
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Newline-joined snapshot for the job record.
    pub fn joined(&self) -> String {
        self.lines.lock().unwrap().join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().unwrap().is_empty()
    }

    /// Section titles in order, for shape comparisons.
    pub fn section_titles(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter_map(|line| {
                let (_, rest) = line.split_once("] ")?;
                let title = rest.strip_prefix("=== ")?.strip_suffix(" ===")?;
                Some(title.to_string())
            })
            .collect()
    }
}
