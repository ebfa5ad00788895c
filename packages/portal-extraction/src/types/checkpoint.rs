//! Resumable batch progress.
//!
//! A checkpoint crosses a process/invocation boundary, so everything in it
//! is built from JSON-serializable primitives. It is created when a deadline
//! interrupts a per-patient loop, consumed exactly once by the continuation
//! invocation that receives it, and discarded when the category completes.

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::table::{CategoryResult, Table};

/// Running counters for one category's per-patient loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounters {
    /// Stored files found across processed patients.
    pub documents_found: usize,
    /// Patients whose name search matched nothing in either scope.
    pub search_failures: usize,
    /// Patients skipped because their only matter is the placeholder case.
    pub patients_skipped: usize,
}

/// Serialized partial progress for a deadline-interrupted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Category that was being processed when the deadline hit.
    pub category: Category,
    /// Index of the first unprocessed patient.
    pub resume_index: usize,
    /// Counters carried across the invocation boundary.
    pub counters: CategoryCounters,
    /// Rows already collected within the interrupted category.
    pub partial: Table,
    /// Results of categories that finished before the interruption.
    pub completed: Vec<CategoryResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::table::Row;
    use serde_json::Value;

    fn sample_checkpoint() -> Checkpoint {
        let mut partial = Table::new();
        let mut row = Row::new();
        row.insert("patient".into(), Value::String("Lovelace, Ada".into()));
        partial.push(row);

        Checkpoint {
            category: Category::Documents,
            resume_index: 17,
            counters: CategoryCounters {
                documents_found: 4,
                search_failures: 2,
                patients_skipped: 1,
            },
            partial,
            completed: vec![CategoryResult::new(Category::Demographics, Table::new())],
        }
    }

    #[test]
    fn checkpoint_round_trips_through_json() {
        let checkpoint = sample_checkpoint();
        let json = serde_json::to_value(&checkpoint).unwrap();
        let back: Checkpoint = serde_json::from_value(json).unwrap();

        assert_eq!(back.category, Category::Documents);
        assert_eq!(back.resume_index, 17);
        assert_eq!(back.counters, checkpoint.counters);
        assert_eq!(back.partial.row_count(), 1);
        assert_eq!(back.completed.len(), 1);
    }
}
