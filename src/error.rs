use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("ClickHouse connection error: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Data insertion error: {0}")]
    Insert(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Error reading file {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("Error saving file {path}: {message}")]
    FileWrite { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure category reported to the caller alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Schema,
    Query,
    Insert,
    UnsupportedFormat,
    FileRead,
    FileWrite,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Connection => write!(f, "ConnectionError"),
            ErrorKind::Schema => write!(f, "SchemaError"),
            ErrorKind::Query => write!(f, "QueryError"),
            ErrorKind::Insert => write!(f, "InsertError"),
            ErrorKind::UnsupportedFormat => write!(f, "UnsupportedFormatError"),
            ErrorKind::FileRead => write!(f, "FileReadError"),
            ErrorKind::FileWrite => write!(f, "FileWriteError"),
        }
    }
}

/// Structured failure: kind + human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Connection(_) => ErrorKind::Connection,
            IngestError::Schema(_) => ErrorKind::Schema,
            IngestError::Query(_) => ErrorKind::Query,
            IngestError::Insert(_) => ErrorKind::Insert,
            IngestError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            IngestError::FileRead { .. } => ErrorKind::FileRead,
            IngestError::FileWrite { .. } => ErrorKind::FileWrite,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    pub(crate) fn file_read(path: &Path, cause: impl fmt::Display) -> Self {
        IngestError::FileRead {
            path: path.display().to_string(),
            message: cause.to_string(),
        }
    }

    pub(crate) fn file_write(path: &Path, cause: impl fmt::Display) -> Self {
        IngestError::FileWrite {
            path: path.display().to_string(),
            message: cause.to_string(),
        }
    }
}
