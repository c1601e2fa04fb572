pub mod config;
pub mod connector;
pub mod error;
pub mod file_codec;
pub mod pipeline;
pub mod query_builder;
pub mod table;
pub mod type_mapper;

pub use config::{ConnectionParams, Settings};
pub use connector::{ColumnSpec, DatabaseConnector, Driver, DriverError, HttpDriver, ResultSet, Session};
pub use error::{ErrorKind, Failure, IngestError, Result};
pub use file_codec::{FileCodec, FileFormat};
pub use pipeline::{
    ColumnsResult, ExportRequest, ExportSummary, FilePreview, ImportRequest, ImportSummary,
    IngestionPipeline, JoinPreviewResult, JoinRequest, ProbeResult,
};
pub use query_builder::{ColumnDef, JoinSpec, JoinType, QueryBuilder, QueryPlan};
pub use table::{Table, Value};
pub use type_mapper::{map_type, DomainType};
