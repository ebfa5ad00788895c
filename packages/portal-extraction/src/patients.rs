//! Run-scoped patient roster cache.
//!
//! Categories that iterate patients share one roster per run. The roster is
//! fetched once from the JSON listing endpoint and memoized on the run
//! context; invocations are independent and concurrent, so nothing here is
//! process-wide.

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{ParseError, PortalError, PortalResult};
use crate::strategies::StrategyContext;
use crate::types::PatientRecord;

/// Memoized full patient roster for one run.
#[derive(Default)]
pub struct PatientIndex {
    roster: OnceCell<Vec<PatientRecord>>,
}

impl PatientIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the roster on first use, reuse it afterwards.
    pub async fn get_or_fetch(&self, ctx: &StrategyContext<'_>) -> PortalResult<&[PatientRecord]> {
        let roster = self
            .roster
            .get_or_try_init(|| fetch_roster(ctx))
            .await?;
        Ok(roster.as_slice())
    }
}

async fn fetch_roster(ctx: &StrategyContext<'_>) -> PortalResult<Vec<PatientRecord>> {
    let url = ctx
        .config
        .endpoints
        .url(&ctx.config.endpoints.roster_json_path);
    let response = ctx.session.ajax_get(&url).await?;
    if !response.is_success() {
        return Err(PortalError::Status {
            status: response.status,
            url,
        });
    }

    let entries = extract_roster_entries(&response.body)?;
    let mut patients: Vec<PatientRecord> = entries
        .iter()
        .filter_map(|entry| {
            let (first, last) = entry_name(entry);
            if first.is_empty() && last.is_empty() {
                return None;
            }
            Some(PatientRecord::new(
                field_string(entry, &["id", "patientId", "PatientId"]),
                first,
                last,
            ))
        })
        .collect();

    if let Some(fragment) = &ctx.options.test_patient_name {
        let needle = fragment.to_lowercase();
        patients.retain(|p| p.search_name().to_lowercase().contains(&needle));
    }
    if let Some(limit) = ctx.options.test_limit {
        patients.truncate(limit);
    }

    info!(patients = patients.len(), "patient roster loaded");
    ctx.log
        .push(format!("patient roster: {} records", patients.len()));
    Ok(patients)
}

/// Find the roster's object array in a payload that is either a bare array
/// or wrapped under one of the portal's usual keys.
pub(crate) fn extract_roster_entries(
    body: &str,
) -> Result<Vec<Map<String, Value>>, ParseError> {
    let value: Value = serde_json::from_str(body)?;

    let array = if value.is_array() {
        value.as_array()
    } else {
        ["rows", "data", "patients"]
            .iter()
            .find_map(|key| value.get(key))
            .and_then(Value::as_array)
    }
    .ok_or_else(|| ParseError::UnexpectedShape {
        reason: "no patient array in roster payload".to_string(),
    })?;

    Ok(array
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect())
}

/// First string-ish value under any of the given keys.
pub(crate) fn field_string(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match entry.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// (first, last) from explicit name fields, or from a combined `name` field
/// in either `"Last, First"` or `"First Last"` shape.
pub(crate) fn entry_name(entry: &Map<String, Value>) -> (String, String) {
    let first = field_string(entry, &["firstName", "first_name", "FirstName"]);
    let last = field_string(entry, &["lastName", "last_name", "LastName"]);
    if let (Some(first), Some(last)) = (&first, &last) {
        return (first.clone(), last.clone());
    }

    if let Some(name) = field_string(entry, &["name", "patientName", "PatientName"]) {
        if let Some((last, first)) = name.split_once(',') {
            return (first.trim().to_string(), last.trim().to_string());
        }
        if let Some((first, last)) = name.split_once(' ') {
            return (first.trim().to_string(), last.trim().to_string());
        }
        return (name, String::new());
    }

    (first.unwrap_or_default(), last.unwrap_or_default())
}
