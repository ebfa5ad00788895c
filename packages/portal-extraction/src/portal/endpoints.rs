//! Endpoint catalog for the target portal.
//!
//! Several logical operations are reachable through multiple legacy path
//! variants discovered empirically; which variant is authoritative differs
//! by portal deployment. The catalog therefore carries the variants as
//! ordered configuration data rather than hard-coded branches, and is serde
//! deserializable so a deployment can override any of it. The default
//! ordering reflects observed behavior and still needs confirmation against
//! each live portal version.

use serde::{Deserialize, Serialize};

/// Known portal endpoints and markers, one value per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointCatalog {
    pub base_url: String,

    /// Anonymous entry page; loading it seeds the anti-forgery cookies.
    pub entry_page: String,
    /// Form-encoded login action.
    pub login_action: String,
    /// First authenticated page; carries the practice identifier.
    pub landing_page: String,

    /// Bulk "export all patients" variants, cheapest first.
    pub patient_export_paths: Vec<String>,
    /// Server-side patient report generation trigger.
    pub report_trigger_path: String,
    /// Degraded JSON roster, guaranteed available.
    pub roster_json_path: String,

    /// Provider list used to resolve a default schedule filter.
    pub provider_list_path: String,
    /// Schedule report generation trigger.
    pub appointment_trigger_path: String,
    /// Schedule export variants polled after triggering.
    pub appointment_export_paths: Vec<String>,

    /// Patient search in the active scope.
    pub patient_search_path: String,
    /// Patient search across archived records.
    pub archived_search_path: String,
    /// Sets the server-side session context to a patient/case.
    pub set_context_path: String,
    /// Lists stored files for the session-context patient.
    pub file_list_path: String,
    /// Consolidated export of selected stored files.
    pub file_export_path: String,

    /// Paginated billing statement listing.
    pub statements_path: String,

    /// Case label the portal auto-creates for every patient; patients whose
    /// only matter carries this label have no real chart to export.
    pub placeholder_case_label: String,

    /// Fixed reconnaissance set for discovery mode: (section label, path).
    pub discovery_pages: Vec<(String, String)>,
}

impl EndpointCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Absolute URL for a catalog path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        Self {
            base_url: "https://portal.example.com".to_string(),
            entry_page: "/login".to_string(),
            login_action: "/login/validate".to_string(),
            landing_page: "/dashboard".to_string(),
            patient_export_paths: vec![
                "/reports/patients/export".to_string(),
                "/reports/patientlist/export".to_string(),
                "/export/patients.csv".to_string(),
                "/ajax/patients/exportall".to_string(),
            ],
            report_trigger_path: "/reports/patients/generate".to_string(),
            roster_json_path: "/ajax/patients/list".to_string(),
            provider_list_path: "/ajax/providers".to_string(),
            appointment_trigger_path: "/reports/schedule/generate".to_string(),
            appointment_export_paths: vec![
                "/reports/schedule/export".to_string(),
                "/export/appointments.csv".to_string(),
            ],
            patient_search_path: "/ajax/patients/search".to_string(),
            archived_search_path: "/ajax/patients/search-archived".to_string(),
            set_context_path: "/ajax/session/set-patient".to_string(),
            file_list_path: "/ajax/documents/list".to_string(),
            file_export_path: "/ajax/documents/export".to_string(),
            statements_path: "/ajax/billing/statements".to_string(),
            placeholder_case_label: "Default Case".to_string(),
            discovery_pages: vec![
                ("login".to_string(), "/login".to_string()),
                ("dashboard".to_string(), "/dashboard".to_string()),
                ("patients".to_string(), "/patients".to_string()),
                ("scheduler".to_string(), "/scheduler".to_string()),
                ("reports".to_string(), "/reports".to_string()),
                ("billing".to_string(), "/billing".to_string()),
            ],
        }
    }
}
