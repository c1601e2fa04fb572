//! Ingestion Pipeline - one self-contained operation per call
//!
//! Every call builds its own connector and drops it (and its session) on
//! return. Nothing is shared between calls apart from the driver settings.

use crate::config::{ConnectionParams, Settings};
use crate::connector::{ColumnSpec, DatabaseConnector, Driver};
use crate::error::Result;
use crate::file_codec::{FileCodec, FileFormat, DEFAULT_DELIMITER};
use crate::query_builder::{JoinSpec, QueryBuilder};
use crate::table::RowMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, info_span};
use uuid::Uuid;

/// Database to file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    pub destination: PathBuf,
    /// Taken from the destination extension when absent; a destination
    /// without an extension gets this format's
    #[serde(default)]
    pub format: Option<FileFormat>,
}

/// File to database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub source: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,
    pub table: String,
    #[serde(default)]
    pub create_table: bool,
    #[serde(default)]
    pub primary_key: Option<String>,
}

fn default_delimiter() -> u8 {
    DEFAULT_DELIMITER
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub main_table: String,
    #[serde(default)]
    pub joins: Vec<JoinSpec>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnsResult {
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub record_count: usize,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub record_count: usize,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPreviewResult {
    pub rows: Vec<RowMap>,
    pub statement_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilePreview {
    pub rows: Vec<RowMap>,
}

/// Ingestion Pipeline - coordinates FileCodec and DatabaseConnector
pub struct IngestionPipeline<D: Driver + Clone> {
    driver: D,
    codec: FileCodec,
    output_dir: PathBuf,
    preview_rows: usize,
}

impl<D: Driver + Clone> IngestionPipeline<D> {
    pub fn with_settings(driver: D, settings: &Settings) -> Self {
        Self {
            driver,
            codec: FileCodec::new(),
            output_dir: settings.output_dir.clone(),
            preview_rows: settings.preview_rows,
        }
    }

    fn connector(&self, params: &ConnectionParams) -> DatabaseConnector<D> {
        DatabaseConnector::new(self.driver.clone(), params.clone())
    }

    /// List tables; doubles as the connection test
    pub fn probe(&self, params: &ConnectionParams) -> Result<ProbeResult> {
        let run_id = Uuid::new_v4();
        let _span = info_span!("pipeline", op = "probe", %run_id).entered();

        let tables = self.connector(params).list_tables()?;
        info!("Found {} tables", tables.len());
        Ok(ProbeResult { tables })
    }

    pub fn columns(&self, params: &ConnectionParams, table: &str) -> Result<ColumnsResult> {
        let run_id = Uuid::new_v4();
        let _span = info_span!("pipeline", op = "columns", %run_id, table).entered();

        let columns = self.connector(params).describe_columns(table)?;
        Ok(ColumnsResult { columns })
    }

    /// Select from a table and write the rows to a file
    pub fn export(&self, params: &ConnectionParams, request: &ExportRequest) -> Result<ExportSummary> {
        let run_id = Uuid::new_v4();
        let _span = info_span!("pipeline", op = "export", %run_id, table = %request.table).entered();

        let mut path = self.resolve_output(&request.destination);
        let format = match request.format {
            Some(format) => {
                if path.extension().is_none() {
                    path.set_extension(format.extension());
                }
                format
            }
            None => FileFormat::from_path(&path)?,
        };

        let statement = QueryBuilder::select(
            &request.columns,
            &request.table,
            request.filter.as_deref(),
            request.limit,
        );
        let table = self.connector(params).execute(&statement)?;

        self.codec.write(&table, &path, format)?;
        info!("Exported {} rows to {}", table.len(), path.display());

        Ok(ExportSummary {
            record_count: table.len(),
            path: path.display().to_string(),
        })
    }

    /// Read a file and batch-insert it, optionally creating the table first
    pub fn import(&self, params: &ConnectionParams, request: &ImportRequest) -> Result<ImportSummary> {
        let run_id = Uuid::new_v4();
        let _span = info_span!("pipeline", op = "import", %run_id, table = %request.table).entered();

        // unsupported files fail before any connection is made
        let format = FileFormat::from_path(&request.source)?;
        let table = self.codec.read(&request.source, format, request.delimiter)?;

        let mut connector = self.connector(params);
        if request.create_table {
            connector.create_table_from_table(&table, &request.table, request.primary_key.as_deref())?;
        }
        let record_count = connector.insert_table(&table, &request.table)?;

        Ok(ImportSummary {
            record_count,
            table: request.table.clone(),
        })
    }

    pub fn join_preview(&self, params: &ConnectionParams, request: &JoinRequest) -> Result<JoinPreviewResult> {
        let run_id = Uuid::new_v4();
        let _span = info_span!("pipeline", op = "join_preview", %run_id, main_table = %request.main_table).entered();

        let preview = self.connector(params).join_preview(
            &request.main_table,
            &request.joins,
            &request.columns,
            request.filter.as_deref(),
        )?;
        info!("Join preview returned {} rows", preview.table.len());

        Ok(JoinPreviewResult {
            rows: preview.table.to_row_maps(),
            statement_text: preview.statement,
        })
    }

    /// First rows of a local file; no database access
    pub fn preview_file(&self, path: &Path, delimiter: u8) -> Result<FilePreview> {
        let run_id = Uuid::new_v4();
        let _span = info_span!("pipeline", op = "preview", %run_id).entered();

        let format = FileFormat::from_path(path)?;
        let rows = self.codec.preview(path, format, delimiter, self.preview_rows)?;
        Ok(FilePreview { rows })
    }

    fn resolve_output(&self, destination: &Path) -> PathBuf {
        if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            self.output_dir.join(destination)
        }
    }
}
