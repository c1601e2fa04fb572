//! File Codec - Tabular files to and from the in-memory Table
//!
//! Three formats are supported:
//! - delimited text (configurable delimiter, header row required)
//! - spreadsheet (first sheet only)
//! - record-oriented JSON (top-level array of objects)

pub mod csv_codec;
pub mod excel_codec;
pub mod json_codec;

use crate::error::{IngestError, Result};
use crate::table::{RowMap, Table};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_DELIMITER: u8 = b',';
pub const DEFAULT_PREVIEW_ROWS: usize = 100;

/// Supported tabular file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Excel,
    Json,
}

impl FileFormat {
    /// Identify the format from a file name extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| {
                IngestError::UnsupportedFormat(format!("{} has no file extension", path.display()))
            })?;

        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(FileFormat::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(FileFormat::Excel),
            "json" => Ok(FileFormat::Json),
            other => Err(IngestError::UnsupportedFormat(format!(".{}", other))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Excel => "xlsx",
            FileFormat::Json => "json",
        }
    }
}

impl FromStr for FileFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "excel" | "xlsx" | "xls" => Ok(FileFormat::Excel),
            "json" => Ok(FileFormat::Json),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Csv => f.write_str("csv"),
            FileFormat::Excel => f.write_str("excel"),
            FileFormat::Json => f.write_str("json"),
        }
    }
}

/// Reads and writes tables; stateless
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec;

impl FileCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path, format: FileFormat, delimiter: u8) -> Result<Table> {
        info!("Reading {} file {}", format, path.display());

        let mut table = match format {
            FileFormat::Csv => csv_codec::read(path, delimiter)?,
            FileFormat::Excel => excel_codec::read(path)?,
            FileFormat::Json => json_codec::read(path)?,
        };
        table.promote_mixed_numeric();

        debug!(
            "Read {} rows x {} columns from {}",
            table.len(),
            table.column_count(),
            path.display()
        );
        Ok(table)
    }

    /// Write a table, creating any missing parent directories first
    pub fn write(&self, table: &Table, path: &Path, format: FileFormat) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IngestError::file_write(path, e))?;
        }

        info!("Writing {} rows as {} to {}", table.len(), format, path.display());

        match format {
            FileFormat::Csv => csv_codec::write(table, path),
            FileFormat::Excel => excel_codec::write(table, path),
            FileFormat::Json => json_codec::write(table, path),
        }
    }

    /// First `row_limit` rows as row-mappings
    pub fn preview(
        &self,
        path: &Path,
        format: FileFormat,
        delimiter: u8,
        row_limit: usize,
    ) -> Result<Vec<RowMap>> {
        let mut table = self.read(path, format, delimiter)?;
        table.truncate(row_limit);
        Ok(table.to_row_maps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("in/data.csv")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("DATA.XLSX")).unwrap(), FileFormat::Excel);
        assert_eq!(FileFormat::from_path(Path::new("legacy.xls")).unwrap(), FileFormat::Excel);
        assert_eq!(FileFormat::from_path(Path::new("rows.json")).unwrap(), FileFormat::Json);
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = FileFormat::from_path(Path::new("dump.parquet")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));

        let err = FileFormat::from_path(Path::new("README")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_format_names() {
        assert_eq!("excel".parse::<FileFormat>().unwrap(), FileFormat::Excel);
        assert_eq!("CSV".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert!(matches!(
            "parquet".parse::<FileFormat>(),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }
}
