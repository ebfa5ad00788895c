//! Data categories the portal can be asked for.

use serde::{Deserialize, Serialize};

/// A kind of data to extract from the portal.
///
/// Wire tags are the lowercase snake_case names; `soap_notes` is accepted as
/// a legacy alias for the document index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Demographics,
    Appointments,
    #[serde(alias = "soap_notes")]
    Documents,
    Financials,
}

impl Category {
    /// All categories in extraction order.
    pub fn all() -> [Category; 4] {
        [
            Category::Demographics,
            Category::Appointments,
            Category::Documents,
            Category::Financials,
        ]
    }

    /// Canonical wire tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Category::Demographics => "demographics",
            Category::Appointments => "appointments",
            Category::Documents => "documents",
            Category::Financials => "financials",
        }
    }

    /// Worksheet name in the assembled workbook.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Category::Demographics => "Demographics",
            Category::Appointments => "Appointments",
            Category::Documents => "Documents",
            Category::Financials => "Financials",
        }
    }

    /// Whether extraction walks the patient roster one record at a time.
    pub fn iterates_patients(&self) -> bool {
        matches!(self, Category::Documents)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
