//! Database Connector - schema discovery, query execution and batch insertion
//!
//! The connector starts Disconnected and connects on first use. A failed
//! connect leaves it Disconnected; once Connected the session is reused for
//! every later operation on the same connector.

pub mod driver;
pub mod http;

pub use driver::{ColumnMeta, Driver, DriverError, ResultSet, Session};
pub use http::{HttpDriver, HttpSession};

use crate::config::ConnectionParams;
use crate::error::{IngestError, Result};
use crate::query_builder::{ColumnDef, JoinSpec, QueryBuilder, QueryPlan};
use crate::table::{Table, Value};
use crate::type_mapper::map_type;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One column as reported by `DESCRIBE TABLE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub default: Option<String>,
    pub comment: Option<String>,
}

/// Join preview rows together with the statement that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPreview {
    pub statement: String,
    pub table: Table,
}

enum ConnectionState<S> {
    Disconnected,
    Connected(S),
}

/// Request-scoped connector owning at most one session
pub struct DatabaseConnector<D: Driver> {
    driver: D,
    params: ConnectionParams,
    state: ConnectionState<D::Session>,
}

impl<D: Driver> DatabaseConnector<D> {
    pub fn new(driver: D, params: ConnectionParams) -> Self {
        Self {
            driver,
            params,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// Connect if not yet connected; a no-op once a session exists
    pub fn ensure_connected(&mut self) -> Result<&mut D::Session> {
        if let ConnectionState::Disconnected = self.state {
            info!(
                "Connecting to ClickHouse at {}:{}",
                self.params.host, self.params.port
            );
            let session = self.driver.connect(&self.params).map_err(|e| {
                warn!("ClickHouse connection failed: {}", e);
                IngestError::Connection(e.to_string())
            })?;
            self.state = ConnectionState::Connected(session);
        }

        match &mut self.state {
            ConnectionState::Connected(session) => Ok(session),
            ConnectionState::Disconnected => Err(IngestError::Connection(
                "no session after connect".to_string(),
            )),
        }
    }

    fn run(&mut self, plan: &QueryPlan) -> Result<std::result::Result<ResultSet, DriverError>> {
        let session = self.ensure_connected()?;
        info!("Executing query: {}", plan.statement());
        Ok(session.execute(plan))
    }

    /// Table names in the configured database (or the session default)
    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        let statement = QueryBuilder::show_tables(self.params.database.as_deref());
        let result = self
            .run(&QueryPlan::read(statement))?
            .map_err(|e| IngestError::Query(format!("Error fetching tables: {}", e)))?;

        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }

    /// Column name, type, default expression and comment of a table
    pub fn describe_columns(&mut self, table: &str) -> Result<Vec<ColumnSpec>> {
        let result = self
            .run(&QueryPlan::read(QueryBuilder::describe(table)))?
            .map_err(|e| IngestError::Query(format!("Error fetching columns: {}", e)))?;

        column_specs(&result)
    }

    /// Run a statement and return its rows in store order
    pub fn execute(&mut self, statement: &str) -> Result<Table> {
        let result = self
            .run(&QueryPlan::read(statement))?
            .map_err(|e| IngestError::Query(e.to_string()))?;

        let table = Table::from_rows(result.column_names(), result.rows)?;
        debug!("Query returned {} rows", table.len());
        Ok(table)
    }

    /// Create `name` with one column per table column, typed from the observed values
    pub fn create_table_from_table(
        &mut self,
        table: &Table,
        name: &str,
        primary_key: Option<&str>,
    ) -> Result<()> {
        let column_defs: Vec<ColumnDef> = table
            .columns()
            .iter()
            .zip(table.domain_types())
            .map(|(column, domain_type)| ColumnDef::new(column.clone(), map_type(domain_type)))
            .collect();

        let statement = QueryBuilder::create_table(name, &column_defs, primary_key);
        self.run(&QueryPlan::read(statement))?
            .map_err(|e| IngestError::Query(format!("Table creation error: {}", e)))?;

        info!("Created table {} ({} columns)", name, column_defs.len());
        Ok(())
    }

    /// Submit every row as one batch; returns the number of rows submitted
    pub fn insert_table(&mut self, table: &Table, name: &str) -> Result<usize> {
        let template = QueryBuilder::insert(name, table.columns());
        let plan = QueryPlan::insert(template, table.rows_for_insert());

        self.run(&plan)?
            .map_err(|e| IngestError::Insert(e.to_string()))?;

        info!("Inserted {} rows into {}", table.len(), name);
        Ok(table.len())
    }

    /// Join query capped at the preview limit
    pub fn join_preview<S: AsRef<str>>(
        &mut self,
        main_table: &str,
        joins: &[JoinSpec],
        columns: &[S],
        filter: Option<&str>,
    ) -> Result<JoinPreview> {
        let statement = QueryBuilder::join_preview(columns, main_table, joins, filter);
        let result = self
            .run(&QueryPlan::read(statement.clone()))?
            .map_err(|e| IngestError::Query(format!("Join query error: {}", e)))?;

        Ok(JoinPreview {
            statement,
            table: Table::from_rows(result.column_names(), result.rows)?,
        })
    }
}

/// Map DESCRIBE rows to column specs.
///
/// ClickHouse names its DESCRIBE columns; when those names are present they
/// are used, otherwise the first four columns are read positionally.
fn column_specs(result: &ResultSet) -> Result<Vec<ColumnSpec>> {
    if result.columns.len() < 4 {
        return Err(IngestError::Schema(format!(
            "DESCRIBE returned {} columns, expected at least 4",
            result.columns.len()
        )));
    }

    let position = |name: &str, fallback: usize| {
        result
            .columns
            .iter()
            .position(|c| c.name == name)
            .unwrap_or(fallback)
    };
    let name_idx = position("name", 0);
    let type_idx = position("type", 1);
    let default_idx = position("default_expression", 2);
    let comment_idx = position("comment", 3);

    result
        .rows
        .iter()
        .map(|row| {
            let text = |idx: usize| -> Option<String> {
                match row.get(idx) {
                    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                    Some(Value::Null) | Some(Value::String(_)) | None => None,
                    Some(other) => Some(other.to_string()),
                }
            };

            let name = text(name_idx)
                .ok_or_else(|| IngestError::Schema("DESCRIBE row without a column name".to_string()))?;
            let type_name = text(type_idx).ok_or_else(|| {
                IngestError::Schema(format!("DESCRIBE row for {} without a type", name))
            })?;

            Ok(ColumnSpec {
                name,
                type_name,
                default: text(default_idx),
                comment: text(comment_idx),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(names: &[&str]) -> Vec<ColumnMeta> {
        names
            .iter()
            .map(|n| ColumnMeta {
                name: n.to_string(),
                type_name: "String".to_string(),
            })
            .collect()
    }

    fn text(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_column_specs_by_clickhouse_names() {
        let result = ResultSet {
            columns: meta(&[
                "name",
                "type",
                "default_type",
                "default_expression",
                "comment",
                "codec_expression",
                "ttl_expression",
            ]),
            rows: vec![vec![
                text("created"),
                text("DateTime"),
                text("DEFAULT"),
                text("now()"),
                text("insert time"),
                text(""),
                text(""),
            ]],
        };

        let specs = column_specs(&result).unwrap();

        assert_eq!(
            specs,
            vec![ColumnSpec {
                name: "created".to_string(),
                type_name: "DateTime".to_string(),
                default: Some("now()".to_string()),
                comment: Some("insert time".to_string()),
            }]
        );
    }

    #[test]
    fn test_column_specs_positional() {
        let result = ResultSet {
            columns: meta(&["c0", "c1", "c2", "c3"]),
            rows: vec![vec![text("id"), text("Int64"), text(""), Value::Null]],
        };

        let specs = column_specs(&result).unwrap();

        assert_eq!(specs[0].name, "id");
        assert_eq!(specs[0].type_name, "Int64");
        assert_eq!(specs[0].default, None);
        assert_eq!(specs[0].comment, None);
    }

    #[test]
    fn test_column_specs_rejects_narrow_result() {
        let result = ResultSet {
            columns: meta(&["name", "type"]),
            rows: vec![vec![text("id"), text("Int64")]],
        };

        assert!(matches!(column_specs(&result), Err(IngestError::Schema(_))));
    }
}
