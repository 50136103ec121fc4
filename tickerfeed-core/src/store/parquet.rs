//! Parquet store with Hive-style partitioning.
//!
//! Layout: `{root}/{dataset}/table={TABLE}/part-{stamp}-{seq}.parquet`
//!
//! - One part file per accepted batch; files are never rewritten
//! - Atomic writes (write to .tmp, rename into place)
//! - Part files that fail to decode are renamed to `{file}.quarantined` and
//!   skipped. I/O errors are returned as-is and leave the file in place.
//! - Timestamp columns are stored as millisecond datetimes

use chrono::{DateTime, Utc};
use polars::prelude::{Column, DataFrame, DataType, ParquetReader, ParquetWriter, SerReader, TimeUnit};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::schema::{ColumnSpec, ColumnType, TableSchema};
use super::{json_str, row_key, validate_rows, RecordStore, RowError, StoreError, TableNames};
use crate::domain::{KeySnapshot, Row};

pub struct ParquetStore {
    root: PathBuf,
    dataset: String,
    tables: TableNames,
    seq: AtomicU64,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>, dataset: impl Into<String>, tables: TableNames) -> Self {
        Self {
            root: root.into(),
            dataset: dataset.into(),
            tables,
            seq: AtomicU64::new(0),
        }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// `{root}/{dataset}/table={TABLE}/`
    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(&self.dataset).join(format!("table={table}"))
    }

    /// Part files of a table, sorted by name (and so by write time).
    pub fn part_files(&self, table: &str) -> Result<Vec<PathBuf>, StoreError> {
        self.tables.schema_of(table)?;
        let dir = self.table_dir(table);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir)
            .map_err(|e| StoreError::Io(format!("read dir {}: {e}", dir.display())))?;
        let mut parts = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StoreError::Io(format!("dir entry: {e}")))?
                .path();
            // Skips .tmp leftovers and .quarantined files
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                parts.push(path);
            }
        }
        parts.sort();
        Ok(parts)
    }

    /// Load every part of a table, quarantining the ones that fail to decode.
    fn read_parts(&self, table: &str) -> Result<Vec<DataFrame>, StoreError> {
        let mut frames = Vec::new();
        for path in self.part_files(table)? {
            match read_part(&path) {
                Ok(df) => frames.push(df),
                // Part files are the only copy of their rows.
                Err(e @ StoreError::Io(_)) => return Err(e),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "quarantining unreadable part file"
                    );
                    if let Err(rename_err) = fs::rename(&path, &quarantine) {
                        tracing::warn!(path = %path.display(), error = %rename_err, "quarantine rename failed");
                    }
                }
            }
        }
        Ok(frames)
    }

    fn next_part_path(&self, dir: &Path) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        loop {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(format!("part-{stamp}-{seq:04}.parquet"));
            if !path.exists() {
                return path;
            }
        }
    }
}

impl RecordStore for ParquetStore {
    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<Vec<RowError>, StoreError> {
        let schema = self.tables.schema_of(table)?;
        let (valid, rejected) = validate_rows(&schema, rows);
        if valid.is_empty() {
            return Ok(rejected);
        }

        let dir = self.table_dir(table);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Io(format!("create dir {}: {e}", dir.display())))?;

        let mut df = rows_to_dataframe(&schema, &valid)?;
        let path = self.next_part_path(&dir);
        write_atomically(&mut df, &path)?;

        tracing::debug!(
            table,
            rows = valid.len(),
            rejected = rejected.len(),
            part = %path.display(),
            "wrote part file"
        );
        Ok(rejected)
    }

    fn existing_keys(&self, table: &str) -> Result<KeySnapshot, StoreError> {
        let mut keys = KeySnapshot::new();
        for df in self.read_parts(table)? {
            let sources = string_column(&df, "source_kind")?;
            let ids = string_column(&df, "id")?;
            for i in 0..df.height() {
                if let Some(key) = row_key(sources.get(i), ids.get(i)) {
                    keys.insert(key);
                }
            }
        }
        Ok(keys)
    }

    fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        Ok(self.read_parts(table)?.iter().map(DataFrame::height).sum())
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn rows_to_dataframe(schema: &TableSchema, rows: &[&Row]) -> Result<DataFrame, StoreError> {
    let columns = schema
        .columns
        .iter()
        .map(|spec| build_column(spec, rows))
        .collect::<Result<Vec<_>, _>>()?;

    DataFrame::new(columns).map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn build_column(spec: &ColumnSpec, rows: &[&Row]) -> Result<Column, StoreError> {
    let name = spec.name;
    let column = match spec.dtype {
        ColumnType::Utf8 => {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|r| json_str(r, name).map(str::to_string))
                .collect();
            Column::new(name.into(), values)
        }
        ColumnType::Int64 => {
            let values: Vec<Option<i64>> = rows
                .iter()
                .map(|r| r.get(name).and_then(Value::as_i64))
                .collect();
            Column::new(name.into(), values)
        }
        ColumnType::Bool => {
            let values: Vec<Option<bool>> = rows
                .iter()
                .map(|r| r.get(name).and_then(Value::as_bool))
                .collect();
            Column::new(name.into(), values)
        }
        ColumnType::Timestamp => {
            let millis: Vec<Option<i64>> = rows
                .iter()
                .map(|r| {
                    json_str(r, name)
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.timestamp_millis())
                })
                .collect();
            Column::new(name.into(), millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .map_err(|e| StoreError::Parquet(format!("{name} cast: {e}")))?
        }
    };
    Ok(column)
}

/// Write to `{path}.tmp`, then rename into place. The temp file never outlives a failure.
fn write_atomically(df: &mut DataFrame, path: &Path) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("parquet.tmp");
    if let Err(e) = write_parquet(df, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io(format!("atomic rename failed: {e}"))
    })
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), StoreError> {
    let file = fs::File::create(path).map_err(|e| StoreError::Io(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| StoreError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

/// Read a part file; it must carry the key columns.
fn read_part(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path)
        .map_err(|e| StoreError::Io(format!("open {}: {e}", path.display())))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;

    for col in ["id", "source_kind"] {
        string_column(&df, col)?;
    }
    Ok(df)
}

fn string_column<'a>(
    df: &'a DataFrame,
    name: &str,
) -> Result<&'a polars::prelude::StringChunked, StoreError> {
    df.column(name)
        .and_then(|c| c.str())
        .map_err(|e| StoreError::Parquet(format!("{name} column: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NaturalKey, RecordKind, SourceKind};
    use serde_json::json;

    fn tweet_row(id: &str) -> Row {
        match json!({
            "id": id,
            "source_kind": "x",
            "tag": "TSLA",
            "created_utc": "2025-03-11T14:02:11Z",
            "text": "$TSLA",
            "likes": 3,
            "retweets": null,
            "replies": null,
            "views": 120,
            "url": null,
            "sentiment": null,
            "market_reference": null,
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn layout_is_hive_style() {
        let store = ParquetStore::new("/data", "market_pulse", TableNames::default());
        assert_eq!(
            store.table_dir("x_tweets"),
            PathBuf::from("/data/market_pulse/table=x_tweets")
        );
    }

    #[test]
    fn batches_append_as_separate_parts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path(), "ds", TableNames::default());
        let table = store.tables().for_kind(RecordKind::SocialMessage).to_string();

        assert!(store.insert_rows(&table, &[tweet_row("1")]).unwrap().is_empty());
        assert!(store
            .insert_rows(&table, &[tweet_row("2"), tweet_row("3")])
            .unwrap()
            .is_empty());

        assert_eq!(store.part_files(&table).unwrap().len(), 2);
        assert_eq!(store.row_count(&table).unwrap(), 3);
        let keys = store.existing_keys(&table).unwrap();
        assert!(keys.contains(&NaturalKey::new(SourceKind::X, "2")));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn corrupt_part_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path(), "ds", TableNames::default());
        let table_dir = store.table_dir("news");
        fs::create_dir_all(&table_dir).unwrap();
        fs::write(table_dir.join("part-bad.parquet"), b"garbage").unwrap();

        assert!(store.existing_keys("news").unwrap().is_empty());
        assert!(table_dir.join("part-bad.parquet.quarantined").exists());
        assert!(store.part_files("news").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn io_failure_is_returned_and_leaves_the_part_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path(), "ds", TableNames::default());
        let table_dir = store.table_dir("news");
        fs::create_dir_all(&table_dir).unwrap();
        let part = table_dir.join("part-unreachable.parquet");
        std::os::unix::fs::symlink(dir.path().join("gone.parquet"), &part).unwrap();

        assert!(matches!(store.existing_keys("news"), Err(StoreError::Io(_))));
        assert!(matches!(store.row_count("news"), Err(StoreError::Io(_))));
        assert!(fs::symlink_metadata(&part).is_ok());
        assert!(!table_dir.join("part-unreachable.parquet.quarantined").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_removes_the_temp_file() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path(), "ds", TableNames::default());
        let schema = store.tables().schema_of("x_tweets").unwrap();
        let mut df = rows_to_dataframe(&schema, &[&tweet_row("1")]).unwrap();

        // Every write through the temp path fails with ENOSPC.
        let path = dir.path().join("part-full.parquet");
        let tmp = path.with_extension("parquet.tmp");
        std::os::unix::fs::symlink("/dev/full", &tmp).unwrap();

        assert!(write_atomically(&mut df, &path).is_err());
        assert!(fs::symlink_metadata(&tmp).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn unknown_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path(), "ds", TableNames::default());
        assert!(matches!(
            store.existing_keys("users"),
            Err(StoreError::UnknownTable(_))
        ));
    }
}
