//! Record-oriented JSON codec: `[{"col": value, ...}, ...]`

use crate::error::{IngestError, Result};
use crate::table::{parse_timestamp_iso, Table, Value};
use serde_json::Value as JsonValue;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn read(path: &Path) -> Result<Table> {
    let content = fs::read_to_string(path).map_err(|e| IngestError::file_read(path, e))?;
    let parsed: JsonValue =
        serde_json::from_str(&content).map_err(|e| IngestError::file_read(path, e))?;

    let records = match parsed {
        JsonValue::Array(records) => records,
        _ => {
            return Err(IngestError::file_read(
                path,
                "expected a top-level array of records",
            ))
        }
    };

    // column order is the order keys are first seen
    let mut columns: Vec<String> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| {
            IngestError::file_read(path, format!("record {} is not an object", idx))
        })?;
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::new(columns.clone());
    for record in &records {
        let row = columns
            .iter()
            .map(|key| record.get(key).map(Value::from_json).unwrap_or(Value::Null))
            .collect();
        table.push_row(row)?;
    }

    promote_timestamp_columns(&mut table);
    Ok(table)
}

/// A column becomes timestamps only when every non-null cell is text in the
/// exact shape `write` produces; any other string keeps the column as text.
fn promote_timestamp_columns(table: &mut Table) {
    for index in 0..table.column_count() {
        let mut any = false;
        let all_timestamps = table.column_values(index).all(|v| match v {
            Value::Null => true,
            Value::String(s) => {
                any = true;
                parse_timestamp_iso(s).is_some()
            }
            _ => false,
        });
        if !(any && all_timestamps) {
            continue;
        }

        table.map_column(index, |v| match v {
            Value::String(s) => parse_timestamp_iso(s)
                .map(Value::Timestamp)
                .unwrap_or_else(|| v.clone()),
            other => other.clone(),
        });
    }
}

pub fn write(table: &Table, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| IngestError::file_write(path, e))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, &table.to_row_maps())
        .map_err(|e| IngestError::file_write(path, e))?;

    writer.flush().map_err(|e| IngestError::file_write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_unions_keys_in_first_seen_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(
            &path,
            r#"[{"id": 1, "name": "a"}, {"id": 2, "extra": {"k": true}}]"#,
        )
        .unwrap();

        let table = read(&path).unwrap();

        assert_eq!(table.columns(), &["id", "name", "extra"]);
        assert_eq!(table.rows()[0][2], Value::Null);
        assert_eq!(table.rows()[1][1], Value::Null);
        assert_eq!(table.rows()[1][2], Value::String(r#"{"k":true}"#.to_string()));
    }

    #[test]
    fn test_read_rejects_non_array_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("object.json");
        fs::write(&path, r#"{"id": 1}"#).unwrap();

        assert!(matches!(read(&path), Err(IngestError::FileRead { .. })));
    }

    #[test]
    fn test_read_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{\"id\": 1,").unwrap();

        assert!(matches!(read(&path), Err(IngestError::FileRead { .. })));
    }

    #[test]
    fn test_write_empty_table_is_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");

        write(&Table::new(vec!["id"]), &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_date_like_text_stays_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dates.json");
        fs::write(
            &path,
            r#"[{"day": "2024-01-01", "at": "2024-01-01T08:00:00", "mixed": "2024-01-01T08:00:00"},
                {"day": "2024-01-02", "at": null, "mixed": "soon"}]"#,
        )
        .unwrap();

        let table = read(&path).unwrap();

        assert_eq!(table.rows()[0][0], Value::String("2024-01-01".to_string()));
        assert!(matches!(table.rows()[0][1], Value::Timestamp(_)));
        assert_eq!(table.rows()[1][1], Value::Null);
        assert_eq!(table.rows()[0][2], Value::String("2024-01-01T08:00:00".to_string()));
    }
}
