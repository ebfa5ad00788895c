//! The portal's date formats.
//!
//! Calendar dates cross the wire as `MM/DD/YYYY` literals. Some AJAX
//! endpoints instead serialize dates in the legacy `/Date(<epoch-ms>)/`
//! form, which is normalized to the calendar literal before any row leaves
//! a strategy. Normalization is idempotent: a value that is not in the
//! epoch form passes through unchanged.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;

use crate::types::Row;

/// The portal's calendar date literal.
pub const PORTAL_DATE_FORMAT: &str = "%m/%d/%Y";

/// Parse an `MM/DD/YYYY` literal.
pub fn parse_portal_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, PORTAL_DATE_FORMAT).ok()
}

/// Default report range when the caller supplies none: five years back
/// through today.
pub fn default_date_range() -> (String, String) {
    let today = Utc::now().date_naive();
    let from = today - Duration::days(5 * 365);
    (
        from.format(PORTAL_DATE_FORMAT).to_string(),
        today.format(PORTAL_DATE_FORMAT).to_string(),
    )
}

/// Normalize one `/Date(<epoch-ms>)/` literal to `MM/DD/YYYY`.
///
/// Returns `None` when the value is not in the epoch form (including values
/// that are already calendar literals), so callers can leave those fields
/// untouched.
pub fn normalize_epoch_date(value: &str) -> Option<String> {
    let pattern = Regex::new(r"^/Date\((-?\d+)(?:[+-]\d{4})?\)/$").unwrap();
    let millis: i64 = pattern
        .captures(value.trim())?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)?;
    Some(timestamp.format(PORTAL_DATE_FORMAT).to_string())
}

/// Normalize every string field of a row in place.
pub fn normalize_row(row: &mut Row) {
    for value in row.values_mut() {
        if let Value::String(text) = value {
            if let Some(normalized) = normalize_epoch_date(text) {
                *value = Value::String(normalized);
            }
        }
    }
}
