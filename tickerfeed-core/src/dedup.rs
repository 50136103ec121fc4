//! Deduplication gate.
//!
//! Drops records whose natural key already exists, either in the store (via
//! the run-start snapshot) or earlier in the same run. Snapshots are only
//! ever grown, so running a batch through twice passes nothing the second
//! time.

use std::collections::HashMap;

use crate::domain::{KeySnapshot, Record};
use crate::store::{RecordStore, StoreError};

/// Keep the records whose key is not in `seen`, in input order, and add
/// their keys to `seen`. In-batch duplicates collapse to the first one.
pub fn filter_new(records: Vec<Record>, seen: &mut KeySnapshot) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| seen.insert(record.key()))
        .collect()
}

/// Per-table key snapshots for one run.
#[derive(Debug, Default)]
pub struct DedupGate {
    snapshots: HashMap<String, KeySnapshot>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the existing keys of every table once. Any failure is fatal for
    /// the run, so the first error is returned as is.
    pub fn load<'t>(
        store: &dyn RecordStore,
        tables: impl IntoIterator<Item = &'t str>,
    ) -> Result<Self, StoreError> {
        let mut gate = Self::new();
        for table in tables {
            if gate.snapshots.contains_key(table) {
                continue;
            }
            let snapshot = store.existing_keys(table)?;
            tracing::info!(table, keys = snapshot.len(), "loaded key snapshot");
            gate.snapshots.insert(table.to_string(), snapshot);
        }
        Ok(gate)
    }

    /// Install a snapshot directly.
    pub fn with_snapshot(mut self, table: impl Into<String>, snapshot: KeySnapshot) -> Self {
        self.snapshots.insert(table.into(), snapshot);
        self
    }

    /// Filter a batch destined for `table`. A table without a loaded
    /// snapshot starts empty.
    pub fn filter(&mut self, table: &str, records: Vec<Record>) -> Vec<Record> {
        let seen = self.snapshots.entry(table.to_string()).or_default();
        filter_new(records, seen)
    }

    pub fn snapshot(&self, table: &str) -> Option<&KeySnapshot> {
        self.snapshots.get(table)
    }

    pub fn known_keys(&self) -> usize {
        self.snapshots.values().map(KeySnapshot::len).sum()
    }
}
