//! Demographics extraction chain.
//!
//! 1. `BulkExport` - hit every known "export all patients" path variant.
//! 2. `TriggeredReport` - fire the server-side report generator, wait out
//!    its materialization delay, then retry the export variants.
//! 3. `JsonRoster` - degraded JSON roster with a smaller fixed field set,
//!    guaranteed available.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PortalResult;
use crate::patients;
use crate::portal::dates;
use crate::types::{Row, Table};

use super::{usable_payload, Outcome, Strategy, StrategyContext};

/// Try every export path variant in catalog order, cheapest first.
pub(crate) async fn try_export_paths(ctx: &StrategyContext<'_>) -> PortalResult<Outcome> {
    for path in &ctx.config.endpoints.patient_export_paths {
        let url = ctx.config.endpoints.url(path);
        match ctx.session.ajax_get(&url).await {
            Ok(response) if response.is_success() && usable_payload(&response.body) => {
                return Ok(Outcome::Rows(Table::from_delimited(&response.body)));
            }
            Ok(response) => {
                debug!(path, status = response.status, "export variant not usable");
            }
            Err(e) => {
                warn!(path, error = %e, "export variant failed");
            }
        }
    }
    Ok(Outcome::NoData)
}

/// Direct bulk export.
pub struct BulkExport;

#[async_trait]
impl Strategy for BulkExport {
    fn name(&self) -> &str {
        "bulk-export"
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>) -> PortalResult<Outcome> {
        try_export_paths(ctx).await
    }
}

/// Trigger report generation, wait for materialization, export again.
pub struct TriggeredReport;

#[async_trait]
impl Strategy for TriggeredReport {
    fn name(&self) -> &str {
        "triggered-report"
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>) -> PortalResult<Outcome> {
        if ctx.config.report_delay > ctx.deadline.remaining() {
            ctx.log
                .push("demographics: not enough budget left to wait for report generation");
            return Ok(Outcome::NoData);
        }

        let url = ctx.config.endpoints.url(&ctx.config.endpoints.report_trigger_path);
        let form = vec![
            ("report".to_string(), "patient_list".to_string()),
            ("format".to_string(), "csv".to_string()),
        ];
        let response = ctx.session.ajax_post_form(&url, form).await?;
        debug!(status = response.status, "patient report triggered");

        tokio::time::sleep(ctx.config.report_delay).await;
        try_export_paths(ctx).await
    }
}

/// Degraded JSON roster fallback: id, name, birth date, contact info.
pub struct JsonRoster;

#[async_trait]
impl Strategy for JsonRoster {
    fn name(&self) -> &str {
        "json-roster"
    }

    async fn attempt(&self, ctx: &StrategyContext<'_>) -> PortalResult<Outcome> {
        let url = ctx.config.endpoints.url(&ctx.config.endpoints.roster_json_path);
        let response = ctx.session.ajax_get(&url).await?;
        if !response.is_success() {
            return Err(crate::error::PortalError::Status {
                status: response.status,
                url,
            });
        }

        let entries = patients::extract_roster_entries(&response.body)?;
        if entries.is_empty() {
            return Ok(Outcome::NoData);
        }

        let mut table = Table::new();
        for entry in &entries {
            let mut row = Row::new();
            row.insert(
                "id".to_string(),
                patients::field_string(entry, &["id", "patientId", "PatientId"])
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            let (first, last) = patients::entry_name(entry);
            row.insert("first_name".to_string(), Value::String(first));
            row.insert("last_name".to_string(), Value::String(last));
            row.insert(
                "birth_date".to_string(),
                patients::field_string(entry, &["dob", "birthDate", "DateOfBirth"])
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            row.insert(
                "phone".to_string(),
                patients::field_string(entry, &["phone", "phoneNumber", "HomePhone"])
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            row.insert(
                "email".to_string(),
                patients::field_string(entry, &["email", "emailAddress", "Email"])
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            dates::normalize_row(&mut row);
            table.push(row);
        }
        Ok(Outcome::Rows(table))
    }
}
