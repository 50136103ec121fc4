//! Append-only record store.
//!
//! The [`RecordStore`] trait is the seam the run drives; [`ParquetStore`] is
//! the on-disk implementation and [`MemoryStore`] backs dry runs and tests.
//! Both validate rows against the table's [`TableSchema`] and write the valid
//! ones, reporting the rest as [`RowError`]s.

pub mod memory;
pub mod parquet;
pub mod schema;

pub use memory::MemoryStore;
pub use parquet::ParquetStore;
pub use schema::{ColumnSpec, ColumnType, TableSchema};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{KeySnapshot, NaturalKey, RecordKind, Row, SourceKind};

/// Whole-call store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("store I/O error: {0}")]
    Io(String),

    #[error("parquet error: {0}")]
    Parquet(String),
}

/// One rejected row of an `insert_rows` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Position in the submitted slice.
    pub index: usize,
    pub reason: String,
}

/// Capability the run needs from the analytical store.
pub trait RecordStore: Send + Sync {
    /// Append rows. Invalid rows are returned, valid rows are written.
    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<Vec<RowError>, StoreError>;

    /// Natural keys of every row currently in `table`.
    fn existing_keys(&self, table: &str) -> Result<KeySnapshot, StoreError>;

    fn row_count(&self, table: &str) -> Result<usize, StoreError>;
}

/// Destination table of each record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub posts: String,
    pub comments: String,
    pub messages: String,
    pub news: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            posts: "wsb_posts".into(),
            comments: "wsb_comments".into(),
            messages: "x_tweets".into(),
            news: "news".into(),
        }
    }
}

impl TableNames {
    pub fn for_kind(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Post => &self.posts,
            RecordKind::Comment => &self.comments,
            RecordKind::SocialMessage => &self.messages,
            RecordKind::NewsItem => &self.news,
        }
    }

    /// The record kind stored in `table`, if it is one of ours.
    pub fn kind_of(&self, table: &str) -> Option<RecordKind> {
        RecordKind::ALL
            .into_iter()
            .find(|&kind| self.for_kind(kind) == table)
    }

    pub fn schema_of(&self, table: &str) -> Result<TableSchema, StoreError> {
        self.kind_of(table)
            .map(TableSchema::for_kind)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    /// `(kind, table)` pairs in record-kind order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordKind, &str)> + '_ {
        RecordKind::ALL.into_iter().map(|kind| (kind, self.for_kind(kind)))
    }

    /// Names that more than one kind maps to.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        let mut dupes = Vec::new();
        for (_, table) in self.iter() {
            if seen.contains(&table) {
                if !dupes.contains(&table) {
                    dupes.push(table);
                }
            } else {
                seen.push(table);
            }
        }
        dupes
    }
}

/// Split rows into valid ones and per-row rejections.
pub(crate) fn validate_rows<'r>(
    schema: &TableSchema,
    rows: &'r [Row],
) -> (Vec<&'r Row>, Vec<RowError>) {
    let mut valid = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match schema.validate(row) {
            Ok(()) => valid.push(row),
            Err(reason) => rejected.push(RowError { index, reason }),
        }
    }
    (valid, rejected)
}

/// The natural key of a stored row, when its key columns are readable.
pub(crate) fn row_key(source_kind: Option<&str>, id: Option<&str>) -> Option<NaturalKey> {
    let source: SourceKind = source_kind?.parse().ok()?;
    Some(NaturalKey::new(source, id?))
}

pub(crate) fn json_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_map_both_ways() {
        let tables = TableNames::default();
        assert_eq!(tables.for_kind(RecordKind::SocialMessage), "x_tweets");
        assert_eq!(tables.kind_of("wsb_comments"), Some(RecordKind::Comment));
        assert_eq!(tables.kind_of("nope"), None);
        assert!(matches!(
            tables.schema_of("nope"),
            Err(StoreError::UnknownTable(t)) if t == "nope"
        ));
        assert!(tables.duplicates().is_empty());
    }

    #[test]
    fn shared_table_name_is_reported() {
        let tables = TableNames {
            news: "wsb_posts".into(),
            ..TableNames::default()
        };
        assert_eq!(tables.duplicates(), vec!["wsb_posts"]);
    }

    #[test]
    fn row_key_needs_known_source() {
        assert_eq!(
            row_key(Some("x"), Some("1")),
            Some(NaturalKey::new(SourceKind::X, "1"))
        );
        assert_eq!(row_key(Some("myspace"), Some("1")), None);
        assert_eq!(row_key(Some("x"), None), None);
    }
}
