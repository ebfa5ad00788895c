//! Patient roster records.

use serde::{Deserialize, Serialize};

/// One patient from the portal roster.
///
/// Some roster strategies yield only names, so the identifier is optional.
/// Immutable once cached within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

impl PatientRecord {
    pub fn new(
        id: Option<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// `"Last, First"`, the shape the portal's patient search expects.
    pub fn search_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_name_is_last_comma_first() {
        let patient = PatientRecord::new(Some("42".into()), "Ada", "Lovelace");
        assert_eq!(patient.search_name(), "Lovelace, Ada");
    }
}
