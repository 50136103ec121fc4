//! Table schemas and per-row validation.
//!
//! Every destination table holds exactly one record kind. Rows are checked
//! against the kind's column list before anything is written:
//!
//! - every field must be a declared column,
//! - non-nullable columns must be present and non-null,
//! - values must match the declared column type.

use chrono::DateTime;
use serde_json::Value;

use crate::domain::{RecordKind, Row};

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Utf8,
    Int64,
    Bool,
    /// RFC 3339 string in rows, millisecond datetime on disk.
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub dtype: ColumnType,
    pub nullable: bool,
}

const fn required(name: &'static str, dtype: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        dtype,
        nullable: false,
    }
}

const fn optional(name: &'static str, dtype: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        dtype,
        nullable: true,
    }
}

use ColumnType::{Bool, Int64, Timestamp, Utf8};

const COMMON: [ColumnSpec; 4] = [
    required("id", Utf8),
    required("source_kind", Utf8),
    required("tag", Utf8),
    required("created_utc", Timestamp),
];

const ANNOTATIONS: [ColumnSpec; 2] = [optional("sentiment", Utf8), optional("market_reference", Utf8)];

/// Ordered column list of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub kind: RecordKind,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// The schema for a record kind. Column names match `Record::to_row`.
    pub fn for_kind(kind: RecordKind) -> Self {
        let specific: Vec<ColumnSpec> = match kind {
            RecordKind::Post => vec![
                required("title", Utf8),
                optional("body", Utf8),
                optional("upvotes", Int64),
                optional("comments_count", Int64),
                optional("url", Utf8),
                optional("image_url", Utf8),
            ],
            RecordKind::Comment => vec![
                required("post_id", Utf8),
                optional("body", Utf8),
                optional("upvotes", Int64),
                optional("agrees_with_post", Bool),
            ],
            RecordKind::SocialMessage => vec![
                optional("text", Utf8),
                optional("likes", Int64),
                optional("retweets", Int64),
                optional("replies", Int64),
                optional("views", Int64),
                optional("url", Utf8),
            ],
            RecordKind::NewsItem => vec![
                required("title", Utf8),
                required("source", Utf8),
                optional("url", Utf8),
            ],
        };

        let columns = COMMON
            .into_iter()
            .chain(specific)
            .chain(ANNOTATIONS)
            .collect();
        Self { kind, columns }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// Check one row. The error string is the rejection reason.
    pub fn validate(&self, row: &Row) -> Result<(), String> {
        if let Some(unknown) = row.keys().find(|k| self.column(k).is_none()) {
            return Err(format!("unknown field '{unknown}'"));
        }

        for col in &self.columns {
            match row.get(col.name) {
                None | Some(Value::Null) => {
                    if !col.nullable {
                        return Err(format!("missing required field '{}'", col.name));
                    }
                }
                Some(value) => {
                    if !type_matches(col.dtype, value) {
                        return Err(format!(
                            "field '{}' expected {:?}, got {}",
                            col.name,
                            col.dtype,
                            json_type(value)
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn type_matches(dtype: ColumnType, value: &Value) -> bool {
    match dtype {
        ColumnType::Utf8 => value.is_string(),
        ColumnType::Int64 => value.is_i64(),
        ColumnType::Bool => value.is_boolean(),
        ColumnType::Timestamp => value
            .as_str()
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn news_row() -> Row {
        row(json!({
            "id": "n1",
            "source_kind": "news",
            "tag": "AAPL",
            "created_utc": "2025-03-11T14:00:00Z",
            "title": "Apple shares climb",
            "source": "Reuters",
            "url": null,
            "sentiment": null,
            "market_reference": null,
        }))
    }

    #[test]
    fn well_formed_row_passes() {
        let schema = TableSchema::for_kind(RecordKind::NewsItem);
        assert_eq!(schema.validate(&news_row()), Ok(()));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut r = news_row();
        r.insert("extra".into(), json!(1));
        let err = TableSchema::for_kind(RecordKind::NewsItem)
            .validate(&r)
            .unwrap_err();
        assert!(err.contains("unknown field 'extra'"));
    }

    #[test]
    fn null_in_required_column_is_rejected() {
        let mut r = news_row();
        r.insert("title".into(), Value::Null);
        let err = TableSchema::for_kind(RecordKind::NewsItem)
            .validate(&r)
            .unwrap_err();
        assert!(err.contains("'title'"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut r = news_row();
        r.insert("created_utc".into(), json!("yesterday"));
        assert!(TableSchema::for_kind(RecordKind::NewsItem)
            .validate(&r)
            .is_err());
    }

    #[test]
    fn every_kind_starts_with_key_columns() {
        for kind in RecordKind::ALL {
            let names: Vec<_> = TableSchema::for_kind(kind).column_names().take(2).collect();
            assert_eq!(names, vec!["id", "source_kind"]);
        }
    }
}
