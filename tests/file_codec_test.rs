use ch_ingest::table::parse_timestamp;
use ch_ingest::{ErrorKind, FileCodec, FileFormat, Table, Value};
use std::fs;
use tempfile::TempDir;

fn sample_table() -> Table {
    Table::from_rows(
        vec!["id", "amount", "paid", "customer", "created_at", "ratio", "big"],
        vec![
            vec![
                Value::Int(1),
                Value::Float(10.5),
                Value::Bool(true),
                Value::String("Acme, Inc.".to_string()),
                Value::Timestamp(parse_timestamp("2024-03-01 09:30:00").unwrap()),
                Value::Float(1.0),
                Value::Int(9_007_199_254_740_993),
            ],
            vec![
                Value::Int(2),
                Value::Float(3.25),
                Value::Bool(false),
                Value::String("O'Brien \"Ltd\"".to_string()),
                Value::Timestamp(parse_timestamp("2024-03-02 18:00:05").unwrap()),
                Value::Float(2.0),
                Value::Int(-5),
            ],
            vec![
                Value::Int(3),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ],
        ],
    )
    .unwrap()
}

#[test]
fn test_round_trip_all_formats() {
    let dir = TempDir::new().unwrap();
    let codec = FileCodec::new();
    let table = sample_table();

    for name in ["out.csv", "out.json", "out.xlsx"] {
        let path = dir.path().join(name);
        let format = FileFormat::from_path(&path).unwrap();

        codec.write(&table, &path, format).unwrap();
        let back = codec.read(&path, format, b',').unwrap();

        assert_eq!(back, table, "round trip through {}", name);
    }
}

#[test]
fn test_typed_formats_keep_date_like_and_zero_padded_text() {
    let dir = TempDir::new().unwrap();
    let codec = FileCodec::new();
    let table = Table::from_rows(
        vec!["day", "zip"],
        vec![
            vec![
                Value::String("2024-01-01".to_string()),
                Value::String("02134".to_string()),
            ],
            vec![
                Value::String("2024-01-01 10:00:00".to_string()),
                Value::String("10001".to_string()),
            ],
        ],
    )
    .unwrap();

    // delimited text is untyped, so these would come back as timestamps and ints
    for name in ["text.json", "text.xlsx"] {
        let path = dir.path().join(name);
        let format = FileFormat::from_path(&path).unwrap();

        codec.write(&table, &path, format).unwrap();
        let back = codec.read(&path, format, b',').unwrap();

        assert_eq!(back, table, "round trip through {}", name);
    }
}

#[test]
fn test_tab_delimited_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("in.tsv");
    fs::write(&path, "code\tlabel\n7\tseven\n8\t\n").unwrap();

    let table = FileCodec::new().read(&path, FileFormat::Csv, b'\t').unwrap();

    assert_eq!(table.columns(), &["code", "label"]);
    assert_eq!(table.rows()[0], vec![Value::Int(7), Value::String("seven".to_string())]);
    assert_eq!(table.rows()[1], vec![Value::Int(8), Value::Null]);
}

#[test]
fn test_duplicate_headers_are_renamed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dupes.csv");
    fs::write(&path, "id,id,\n1,2,3\n").unwrap();

    let table = FileCodec::new().read(&path, FileFormat::Csv, b',').unwrap();

    assert_eq!(table.columns(), &["id", "id.1", "unnamed_2"]);
}

#[test]
fn test_mixed_numeric_column_reads_as_float() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.json");
    fs::write(&path, r#"[{"v": 1}, {"v": 2.5}, {"w": "x"}]"#).unwrap();

    let table = FileCodec::new().read(&path, FileFormat::Json, b',').unwrap();

    assert_eq!(table.columns(), &["v", "w"]);
    assert_eq!(
        table.column_values(0).cloned().collect::<Vec<_>>(),
        vec![Value::Float(1.0), Value::Float(2.5), Value::Null]
    );
}

#[test]
fn test_malformed_json_is_read_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"not": "an array"}"#).unwrap();

    let err = FileCodec::new().read(&path, FileFormat::Json, b',').unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileRead);
}

#[test]
fn test_write_into_unwritable_location_is_write_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "file, not a directory").unwrap();

    let err = FileCodec::new()
        .write(&sample_table(), &blocker.join("out.csv"), FileFormat::Csv)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileWrite);
}

#[test]
fn test_preview_returns_row_mappings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.csv");
    fs::write(&path, "name,age\nann,31\nbo,27\ncy,45\n").unwrap();

    let rows = FileCodec::new().preview(&path, FileFormat::Csv, b',', 2).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["name"], serde_json::json!("bo"));
    assert_eq!(rows[1]["age"], serde_json::json!(27));
    assert_eq!(rows[0].keys().cloned().collect::<Vec<_>>(), vec!["name", "age"]);
}
