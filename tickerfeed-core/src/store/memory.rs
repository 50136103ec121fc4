use std::collections::HashMap;
use std::sync::Mutex;

use super::{json_str, row_key, validate_rows, RecordStore, RowError, StoreError, TableNames};
use crate::domain::{KeySnapshot, Row};

/// In-memory store with the same validation as [`super::ParquetStore`].
/// Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: TableNames,
    rows: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new(tables: TableNames) -> Self {
        Self {
            tables,
            rows: Mutex::new(HashMap::new()),
        }
    }

    /// Copy of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Row>>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryStore {
    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<Vec<RowError>, StoreError> {
        let schema = self.tables.schema_of(table)?;
        let (valid, rejected) = validate_rows(&schema, rows);
        self.lock()
            .entry(table.to_string())
            .or_default()
            .extend(valid.into_iter().cloned());
        Ok(rejected)
    }

    fn existing_keys(&self, table: &str) -> Result<KeySnapshot, StoreError> {
        self.tables.schema_of(table)?;
        Ok(self
            .lock()
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|row| row_key(json_str(row, "source_kind"), json_str(row, "id")))
            .collect())
    }

    fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        self.tables.schema_of(table)?;
        Ok(self.lock().get(table).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NaturalKey, SourceKind};
    use serde_json::{json, Value};

    fn comment_row(id: &str, post_id: Value) -> Row {
        match json!({
            "id": id,
            "source_kind": "reddit",
            "tag": "wallstreetbets",
            "created_utc": "2025-03-11T14:02:11Z",
            "post_id": post_id,
            "body": "to the moon",
            "upvotes": 1,
            "sentiment": null,
            "market_reference": null,
            "agrees_with_post": null,
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn invalid_rows_are_reported_valid_rows_kept() {
        let store = MemoryStore::new(TableNames::default());
        let errors = store
            .insert_rows(
                "wsb_comments",
                &[
                    comment_row("c1", json!("p1")),
                    comment_row("c2", Value::Null),
                    comment_row("c3", json!("p1")),
                ],
            )
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 1);
        assert_eq!(store.row_count("wsb_comments").unwrap(), 2);

        let keys = store.existing_keys("wsb_comments").unwrap();
        assert!(keys.contains(&NaturalKey::new(SourceKind::Reddit, "c3")));
        assert!(!keys.contains(&NaturalKey::new(SourceKind::Reddit, "c2")));
    }

    #[test]
    fn empty_table_has_no_keys() {
        let store = MemoryStore::new(TableNames::default());
        assert!(store.existing_keys("news").unwrap().is_empty());
        assert!(store.row_count("bogus").is_err());
    }
}
