//! Endpoint reconnaissance mode.
//!
//! Logs in, fetches the fixed set of known pages, and records structural
//! extracts (forms, option lists, response previews) into the run log for
//! manual endpoint confirmation. Never writes category results. Fetch
//! failures are logged per page and do not stop the sweep, so re-running
//! discovery always yields the same set of log sections.

use tracing::debug;

use crate::config::EngineConfig;
use crate::log::RunLog;
use crate::portal::parser;
use crate::session::SessionClient;

const PREVIEW_CHARS: usize = 200;

pub async fn run(session: &SessionClient, config: &EngineConfig, log: &RunLog) {
    log.push("discovery: probing known portal surfaces");

    for (label, path) in &config.endpoints.discovery_pages {
        log.push_section(label);
        let url = config.endpoints.url(path);

        let response = match session.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                log.push(format!("{path} fetch failed: {e}"));
                continue;
            }
        };
        log.push(format!("{path} -> HTTP {}", response.status));

        if let Some(title) = parser::title(&response.body) {
            log.push(format!("title: {title}"));
        }

        for form in parser::forms(&response.body) {
            log.push(format!(
                "form action={} method={} inputs=[{}]",
                form.action,
                form.method,
                form.inputs.join(", ")
            ));
        }

        for select in parser::select_lists(&response.body) {
            let sample: Vec<&str> = select
                .options
                .iter()
                .take(3)
                .map(|(value, _)| value.as_str())
                .collect();
            log.push(format!(
                "select {}: {} options [{}]",
                select.name,
                select.options.len(),
                sample.join(", ")
            ));
        }

        log.push(format!(
            "preview: {}",
            parser::body_preview(&response.body, PREVIEW_CHARS)
        ));
        debug!(page = %label, "discovery page recorded");
    }

    log.push("discovery: sweep complete");
}
