//! Row-oriented tabular payloads.
//!
//! Rows are ordered named-field records; field order is preserved so the
//! assembled workbook columns match what the portal returned.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::category::Category;

/// One named-field record.
pub type Row = IndexMap<String, Value>;

/// An ordered sequence of rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Column names, taken from the first row.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Parse a delimited export payload: first line is the header, every
    /// following non-empty line is one record. The delimiter is a tab when
    /// the header contains one, otherwise a comma. Double-quoted fields may
    /// contain the delimiter.
    pub fn from_delimited(payload: &str) -> Self {
        let mut lines = payload.lines().filter(|line| !line.trim().is_empty());

        let header = match lines.next() {
            Some(line) => line,
            None => return Self::new(),
        };
        let delimiter = if header.contains('\t') { '\t' } else { ',' };
        let columns: Vec<String> = split_delimited(header, delimiter);

        let mut table = Self::new();
        for line in lines {
            let fields = split_delimited(line, delimiter);
            let mut row = Row::new();
            for (index, column) in columns.iter().enumerate() {
                let value = fields.get(index).cloned().unwrap_or_default();
                row.insert(column.clone(), Value::String(value));
            }
            table.push(row);
        }
        table
    }
}

/// Split one delimited line, honoring double-quoted fields.
fn split_delimited(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                fields.push(std::mem::take(&mut current).trim().to_string());
            }
            c => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// The outcome of extracting one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,
    pub table: Table,
}

impl CategoryResult {
    pub fn new(category: Category, table: Table) -> Self {
        Self { category, table }
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_row_count_is_lines_minus_header() {
        let payload = "Id,First,Last\n1,Ada,Lovelace\n2,Alan,Turing\n";
        let table = Table::from_delimited(payload);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns(), vec!["Id", "First", "Last"]);
        assert_eq!(table.rows[0]["First"], Value::String("Ada".into()));
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let payload = "Name,City\n\"Lovelace, Ada\",London\n";
        let table = Table::from_delimited(payload);
        assert_eq!(table.rows[0]["Name"], Value::String("Lovelace, Ada".into()));
    }

    #[test]
    fn tab_delimited_payloads_are_detected() {
        let payload = "Id\tName\n7\tGrace Hopper\n";
        let table = Table::from_delimited(payload);
        assert_eq!(table.rows[0]["Name"], Value::String("Grace Hopper".into()));
    }

    #[test]
    fn empty_payload_yields_empty_table() {
        assert!(Table::from_delimited("").is_empty());
        assert!(Table::from_delimited("OnlyHeader\n").is_empty());
    }

    #[test]
    fn field_order_survives_serde() {
        let payload = "Zulu,Alpha,Mike\n1,2,3\n";
        let table = Table::from_delimited(payload);
        let json = serde_json::to_string(&table).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(back.columns(), vec!["Zulu", "Alpha", "Mike"]);
    }
}
