//! Document index ("SOAP notes") extraction.
//!
//! One unit of work per patient: search the name in the active scope, then
//! the archived scope; skip patients whose only matter is the portal's
//! auto-created placeholder case; set the server-side session context to
//! the matched patient/case; list stored files; and when any exist, pull a
//! consolidated export, upload it, and record the link. The batch runner
//! drives this task under the run deadline.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::batch::PatientTask;
use crate::error::{ParseError, PortalError, PortalResult};
use crate::stores::ObjectStore;
use crate::types::{CategoryCounters, PatientRecord, Row};

use super::StrategyContext;

/// A patient/case pair returned by the portal's search.
#[derive(Debug, Clone)]
struct CaseMatch {
    patient_id: String,
    case_id: String,
    case_name: String,
}

/// A stored file entry for the session-context patient.
#[derive(Debug, Clone)]
struct FileEntry {
    id: String,
    name: String,
}

pub struct DocumentIndexTask<'a> {
    ctx: &'a StrategyContext<'a>,
    objects: &'a dyn ObjectStore,
    job_id: Uuid,
}

impl<'a> DocumentIndexTask<'a> {
    pub fn new(ctx: &'a StrategyContext<'a>, objects: &'a dyn ObjectStore, job_id: Uuid) -> Self {
        Self {
            ctx,
            objects,
            job_id,
        }
    }

    async fn search_scope(&self, path: &str, name: &str) -> PortalResult<Vec<CaseMatch>> {
        let url = self.ctx.config.endpoints.url(path);
        let form = vec![("searchText".to_string(), name.to_string())];
        let response = self.ctx.session.ajax_post_form(&url, form).await?;
        if !response.is_success() {
            return Err(PortalError::Status {
                status: response.status,
                url,
            });
        }
        parse_case_matches(&response.body).map_err(PortalError::from)
    }

    async fn set_context(&self, matched: &CaseMatch) -> PortalResult<()> {
        let url = self.ctx.config.endpoints.url(&self.ctx.config.endpoints.set_context_path);
        let form = vec![
            ("patientId".to_string(), matched.patient_id.clone()),
            ("caseId".to_string(), matched.case_id.clone()),
        ];
        let response = self.ctx.session.ajax_post_form(&url, form).await?;
        if !response.is_success() {
            return Err(PortalError::Status {
                status: response.status,
                url,
            });
        }
        Ok(())
    }

    async fn list_files(&self) -> PortalResult<Vec<FileEntry>> {
        let url = self.ctx.config.endpoints.url(&self.ctx.config.endpoints.file_list_path);
        let response = self.ctx.session.ajax_get(&url).await?;
        if !response.is_success() {
            return Err(PortalError::Status {
                status: response.status,
                url,
            });
        }
        parse_file_list(&response.body).map_err(PortalError::from)
    }

    async fn export_files(&self, matched: &CaseMatch, files: &[FileEntry]) -> PortalResult<String> {
        let url = self.ctx.config.endpoints.url(&self.ctx.config.endpoints.file_export_path);
        let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        let form = vec![
            ("patientId".to_string(), matched.patient_id.clone()),
            ("fileIds".to_string(), ids.join(",")),
        ];
        let response = self.ctx.session.ajax_post_form(&url, form).await?;
        if !response.is_success() || response.body.is_empty() {
            return Err(PortalError::Status {
                status: response.status,
                url,
            });
        }
        Ok(response.body)
    }
}

#[async_trait]
impl PatientTask for DocumentIndexTask<'_> {
    async fn process(
        &self,
        patient: &PatientRecord,
        counters: &mut CategoryCounters,
    ) -> PortalResult<Option<Row>> {
        let name = patient.search_name();

        let mut matches = self
            .search_scope(&self.ctx.config.endpoints.patient_search_path, &name)
            .await?;
        if matches.is_empty() {
            matches = self
                .search_scope(&self.ctx.config.endpoints.archived_search_path, &name)
                .await?;
        }
        if matches.is_empty() {
            counters.search_failures += 1;
            debug!(patient = %name, "no search match in either scope");
            return Ok(None);
        }

        let placeholder = &self.ctx.config.endpoints.placeholder_case_label;
        let matched = match matches
            .iter()
            .find(|m| !m.case_name.eq_ignore_ascii_case(placeholder))
        {
            Some(matched) => matched.clone(),
            None => {
                counters.patients_skipped += 1;
                debug!(patient = %name, "only the placeholder case exists");
                return Ok(None);
            }
        };

        self.set_context(&matched).await?;

        let files = self.list_files().await?;
        if files.is_empty() {
            return Ok(None);
        }
        counters.documents_found += files.len();

        let document = self.export_files(&matched, &files).await?;
        let storage_path = format!(
            "exports/{}/documents/{}.pdf",
            self.job_id, matched.patient_id
        );
        let link = match self
            .objects
            .put(&storage_path, document.into_bytes(), "application/pdf")
            .await
        {
            Ok(stored) => Value::String(stored),
            Err(e) => {
                warn!(patient = %name, error = %e, "document upload failed");
                self.ctx
                    .log
                    .push(format!("documents: upload failed for {name}: {e}"));
                Value::Null
            }
        };

        let mut row = Row::new();
        row.insert("patient".to_string(), Value::String(name));
        row.insert(
            "patient_id".to_string(),
            Value::String(matched.patient_id.clone()),
        );
        row.insert("case_id".to_string(), Value::String(matched.case_id.clone()));
        row.insert("files".to_string(), Value::from(files.len()));
        row.insert(
            "file_names".to_string(),
            Value::String(
                files
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        );
        row.insert("link".to_string(), link);
        Ok(Some(row))
    }
}

fn parse_case_matches(body: &str) -> Result<Vec<CaseMatch>, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let array = value
        .as_array()
        .or_else(|| value.get("results").and_then(Value::as_array))
        .ok_or_else(|| ParseError::UnexpectedShape {
            reason: "search result is not an array".to_string(),
        })?;

    let mut matches = Vec::with_capacity(array.len());
    for item in array {
        let patient_id = string_field(item, &["patientId", "PatientId", "id"])
            .ok_or_else(|| ParseError::MissingField {
                field: "patientId".to_string(),
            })?;
        let case_id =
            string_field(item, &["caseId", "CaseId"]).ok_or_else(|| ParseError::MissingField {
                field: "caseId".to_string(),
            })?;
        matches.push(CaseMatch {
            patient_id,
            case_id,
            case_name: string_field(item, &["caseName", "CaseName"]).unwrap_or_default(),
        });
    }
    Ok(matches)
}

fn parse_file_list(body: &str) -> Result<Vec<FileEntry>, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let array = value
        .as_array()
        .or_else(|| value.get("files").and_then(Value::as_array))
        .ok_or_else(|| ParseError::UnexpectedShape {
            reason: "file list is not an array".to_string(),
        })?;

    Ok(array
        .iter()
        .filter_map(|item| {
            Some(FileEntry {
                id: string_field(item, &["id", "fileId", "FileId"])?,
                name: string_field(item, &["name", "fileName", "FileName"]).unwrap_or_default(),
            })
        })
        .collect())
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}
