//! Appointment schedule extraction.
//!
//! The schedule report wants a date range and a provider filter. The
//! trigger sometimes answers with the data inline; when it does not, the
//! export endpoint is polled on a bounded schedule while the report
//! materializes server-side, checking the shared run deadline between
//! attempts.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PortalResult;
use crate::portal::dates;
use crate::portal::parser;
use crate::types::Table;

use super::{usable_payload, Outcome, Strategy, StrategyContext};

pub struct ScheduleReport;

#[async_trait]
impl Strategy for ScheduleReport {
    fn name(&self) -> &str {
        "schedule-report"
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>) -> PortalResult<Outcome> {
        let (default_from, default_to) = dates::default_date_range();
        let from = ctx.options.date_from.clone().unwrap_or(default_from);
        let to = ctx.options.date_to.clone().unwrap_or(default_to);
        let provider = resolve_default_provider(ctx).await;

        let trigger_url = ctx
            .config
            .endpoints
            .url(&ctx.config.endpoints.appointment_trigger_path);
        let form = vec![
            ("dateFrom".to_string(), from.clone()),
            ("dateTo".to_string(), to.clone()),
            ("providerId".to_string(), provider),
            ("format".to_string(), "csv".to_string()),
        ];
        let response = ctx.session.ajax_post_form(&trigger_url, form).await?;

        if response.is_success() && usable_payload(&response.body) {
            return Ok(Outcome::Rows(Table::from_delimited(&response.body)));
        }
        debug!(
            status = response.status,
            from, to, "schedule report queued, polling export"
        );

        for attempt in 1..=ctx.config.poll_attempts {
            if ctx.deadline.exceeded() {
                ctx.log
                    .push("appointments: run deadline reached while polling the export");
                return Ok(Outcome::NoData);
            }
            tokio::time::sleep(ctx.config.poll_interval).await;

            for path in &ctx.config.endpoints.appointment_export_paths {
                let url = ctx.config.endpoints.url(path);
                match ctx.session.ajax_get(&url).await {
                    Ok(response) if response.is_success() && usable_payload(&response.body) => {
                        debug!(attempt, path, "schedule export materialized");
                        return Ok(Outcome::Rows(Table::from_delimited(&response.body)));
                    }
                    Ok(response) => {
                        debug!(attempt, path, status = response.status, "export not ready");
                    }
                    Err(e) => {
                        warn!(attempt, path, error = %e, "export poll failed");
                    }
                }
            }
        }

        Ok(Outcome::NoData)
    }
}

/// Pick a default provider from the portal's provider list: first entry of
/// a JSON array, else the first non-empty `<option>` value, else `0`
/// (all providers).
async fn resolve_default_provider(ctx: &StrategyContext<'_>) -> String {
    let url = ctx
        .config
        .endpoints
        .url(&ctx.config.endpoints.provider_list_path);

    let body = match ctx.session.ajax_get(&url).await {
        Ok(response) if response.is_success() => response.body,
        Ok(response) => {
            debug!(status = response.status, "provider list not available");
            return "0".to_string();
        }
        Err(e) => {
            warn!(error = %e, "provider list fetch failed");
            return "0".to_string();
        }
    };

    if let Ok(value) = serde_json::from_str::<Value>(&body) {
        if let Some(first) = value.as_array().and_then(|a| a.first()) {
            for key in ["id", "providerId", "value"] {
                match first.get(key) {
                    Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                    Some(Value::Number(n)) => return n.to_string(),
                    _ => {}
                }
            }
        }
    }

    parser::option_values(&body)
        .into_iter()
        .map(|(value, _)| value)
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "0".to_string())
}
