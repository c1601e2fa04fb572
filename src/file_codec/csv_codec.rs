//! Delimited text codec

use crate::error::{IngestError, Result};
use crate::table::{Table, Value};
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

pub fn read(path: &Path, delimiter: u8) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IngestError::file_read(path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| IngestError::file_read(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut table = Table::new(headers);
    let width = table.column_count();

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| IngestError::file_read(path, e))?;
        if record.len() > width {
            return Err(IngestError::file_read(
                path,
                format!(
                    "record {} has {} fields, expected {}",
                    line + 1,
                    record.len(),
                    width
                ),
            ));
        }

        // short records are padded with nulls
        let row = (0..width)
            .map(|idx| record.get(idx).map(Value::parse_text).unwrap_or(Value::Null))
            .collect();
        table.push_row(row)?;
    }

    Ok(table)
}

pub fn write(table: &Table, path: &Path) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| IngestError::file_write(path, e))?;

    wtr.write_record(table.columns())
        .map_err(|e| IngestError::file_write(path, e))?;

    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| IngestError::file_write(path, e))?;
    }

    wtr.flush().map_err(|e| IngestError::file_write(path, e))
}
