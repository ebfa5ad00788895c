//! Workbook assembly and delivery.
//!
//! All non-empty category results land in one workbook, one sheet per
//! category. When the document index produced rows, an extra index sheet
//! renders the stored-document link column as a clickable reference rather
//! than a raw address. Zero rows overall means no artifact at all; upload
//! and assembly failures are logged and leave sibling results untouched.

use rust_xlsxwriter::{Format, Url, Workbook, Worksheet, XlsxError};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::log::RunLog;
use crate::stores::ObjectStore;
use crate::types::{Category, CategoryResult, Table};

pub const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Build the workbook and upload it, returning the storage path.
///
/// `None` means no artifact was produced: either every category was empty,
/// or assembly/upload failed (already logged).
pub async fn assemble_and_upload(
    job_id: Uuid,
    results: &[CategoryResult],
    objects: &dyn ObjectStore,
    log: &RunLog,
) -> Option<String> {
    let non_empty: Vec<&CategoryResult> = results.iter().filter(|r| !r.table.is_empty()).collect();
    if non_empty.is_empty() {
        return None;
    }

    let bytes = match build_workbook(&non_empty) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "workbook assembly failed");
            log.push(format!("workbook assembly failed: {e}"));
            return None;
        }
    };

    let path = format!("exports/{job_id}/extraction.xlsx");
    match objects.put(&path, bytes, WORKBOOK_CONTENT_TYPE).await {
        Ok(stored) => {
            info!(job_id = %job_id, path = %stored, sheets = non_empty.len(), "workbook uploaded");
            log.push(format!("workbook uploaded to {stored}"));
            Some(stored)
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "workbook upload failed");
            log.push(format!("workbook upload failed: {e}"));
            None
        }
    }
}

/// One sheet per category, plus the clickable document index when document
/// rows exist.
pub fn build_workbook(results: &[&CategoryResult]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for result in results {
        let sheet = workbook.add_worksheet();
        sheet.set_name(result.category.sheet_name())?;
        write_table(sheet, &result.table, &bold)?;
    }

    let documents = results
        .iter()
        .find(|r| r.category == Category::Documents)
        .filter(|r| !r.table.is_empty());
    if let Some(documents) = documents {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Document Index")?;
        write_document_index(sheet, &documents.table, &bold)?;
    }

    workbook.save_to_buffer()
}

fn write_table(sheet: &mut Worksheet, table: &Table, bold: &Format) -> Result<(), XlsxError> {
    let columns = table.columns();
    for (col, name) in columns.iter().enumerate() {
        sheet.write_with_format(0, col as u16, name.as_str(), bold)?;
    }

    for (index, row) in table.rows.iter().enumerate() {
        let row_num = (index + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            write_cell(sheet, row_num, col as u16, row.get(name))?;
        }
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<&Value>,
) -> Result<(), XlsxError> {
    match value {
        Some(Value::Number(n)) => {
            sheet.write_number(row, col, n.as_f64().unwrap_or(0.0))?;
        }
        Some(Value::Bool(b)) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Some(Value::String(s)) => {
            sheet.write_string(row, col, s)?;
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            sheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

/// Patient / files / link, with the link cell clickable when it is an
/// absolute address.
fn write_document_index(
    sheet: &mut Worksheet,
    table: &Table,
    bold: &Format,
) -> Result<(), XlsxError> {
    for (col, name) in ["Patient", "Files", "Document"].iter().enumerate() {
        sheet.write_with_format(0, col as u16, *name, bold)?;
    }

    for (index, row) in table.rows.iter().enumerate() {
        let row_num = (index + 1) as u32;
        write_cell(sheet, row_num, 0, row.get("patient"))?;
        write_cell(sheet, row_num, 1, row.get("files"))?;

        match row.get("link") {
            Some(Value::String(link)) if link.starts_with("http") => {
                sheet.write_url(row_num, 2, Url::new(link.clone()).set_text("open"))?;
            }
            other => write_cell(sheet, row_num, 2, other)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryObjectStore;
    use crate::types::Row;
    use serde_json::json;

    fn demographics_result() -> CategoryResult {
        CategoryResult::new(
            Category::Demographics,
            Table::from_delimited("Id,Name\n1,Ada\n2,Alan\n"),
        )
    }

    fn documents_result(link: &str) -> CategoryResult {
        let mut table = Table::new();
        let mut row = Row::new();
        row.insert("patient".into(), json!("Lovelace, Ada"));
        row.insert("files".into(), json!(2));
        row.insert("link".into(), json!(link));
        table.push(row);
        CategoryResult::new(Category::Documents, table)
    }

    #[test]
    fn workbook_bytes_are_a_zip_archive() {
        let result = demographics_result();
        let bytes = build_workbook(&[&result]).unwrap();
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn document_rows_add_the_index_sheet() {
        let demographics = demographics_result();
        let documents = documents_result("https://files.example.com/exports/a.pdf");
        // both shapes build cleanly; the index sheet renders the absolute
        // link as a URL cell and a bare path as text
        build_workbook(&[&demographics, &documents]).unwrap();
        let relative = documents_result("exports/x/documents/1.pdf");
        build_workbook(&[&relative]).unwrap();
    }

    #[tokio::test]
    async fn empty_results_produce_no_artifact() {
        let objects = MemoryObjectStore::new();
        let log = RunLog::new();
        let empty = CategoryResult::new(Category::Demographics, Table::new());

        let path =
            assemble_and_upload(Uuid::new_v4(), &[empty], &objects, &log).await;
        assert!(path.is_none());
        assert_eq!(objects.object_count(), 0);
    }

    #[tokio::test]
    async fn upload_failure_is_logged_not_fatal() {
        let objects = MemoryObjectStore::new();
        objects.fail_puts(true);
        let log = RunLog::new();

        let path =
            assemble_and_upload(Uuid::new_v4(), &[demographics_result()], &objects, &log).await;
        assert!(path.is_none());
        assert!(log.joined().contains("upload failed"));
    }

    #[tokio::test]
    async fn successful_upload_returns_the_storage_path() {
        let objects = MemoryObjectStore::new();
        let log = RunLog::new();
        let job_id = Uuid::new_v4();

        let path = assemble_and_upload(job_id, &[demographics_result()], &objects, &log)
            .await
            .unwrap();
        assert_eq!(path, format!("exports/{job_id}/extraction.xlsx"));
        assert!(objects.get(&path).is_some());
    }
}
