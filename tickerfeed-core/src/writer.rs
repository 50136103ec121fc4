//! Store writer: one batched append per (table, unit) with per-row outcomes.

use crate::domain::Record;
use crate::store::RecordStore;

/// Outcome of one batch.
#[derive(Debug, Default)]
pub struct WriteResult {
    pub accepted_count: usize,
    /// Rejected records with the store's reason, in input order.
    pub rejected: Vec<(Record, String)>,
    /// Accepted records in input order.
    pub accepted: Vec<Record>,
}

impl WriteResult {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

pub struct StoreWriter<'s> {
    store: &'s dyn RecordStore,
}

impl<'s> StoreWriter<'s> {
    pub fn new(store: &'s dyn RecordStore) -> Self {
        Self { store }
    }

    /// Append `records` to `table`. Never fails: a whole-call store error
    /// rejects every record with that error's message.
    pub fn write(&self, table: &str, records: Vec<Record>) -> WriteResult {
        if records.is_empty() {
            return WriteResult::default();
        }

        let rows: Vec<_> = records.iter().map(Record::to_row).collect();
        match self.store.insert_rows(table, &rows) {
            Ok(row_errors) => {
                let mut reasons: Vec<Option<String>> = vec![None; records.len()];
                for err in row_errors {
                    if let Some(slot) = reasons.get_mut(err.index) {
                        *slot = Some(err.reason);
                    }
                }

                let mut result = WriteResult::default();
                for (record, reason) in records.into_iter().zip(reasons) {
                    match reason {
                        Some(reason) => {
                            tracing::warn!(table, key = %record.key(), %reason, "row rejected");
                            result.rejected.push((record, reason));
                        }
                        None => result.accepted.push(record),
                    }
                }
                result.accepted_count = result.accepted.len();
                result
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(table, rows = records.len(), error = %reason, "batch rejected");
                WriteResult {
                    accepted_count: 0,
                    rejected: records.into_iter().map(|r| (r, reason.clone())).collect(),
                    accepted: Vec::new(),
                }
            }
        }
    }
}
