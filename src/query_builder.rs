//! Query Builder - Deterministic statement assembly
//!
//! Table names, column lists, filters and join conditions are caller-trusted
//! fragments and are inserted verbatim. Only bulk-insert row values are kept
//! out of the statement text: they travel as the bound rows of a [`QueryPlan`].

use crate::table::Value;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Row cap applied to every join preview
pub const JOIN_PREVIEW_LIMIT: u64 = 100;

/// Join keyword. Unknown keywords are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Other(String),
}

impl FromStr for JoinType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let join_type = match s.trim().to_ascii_uppercase().as_str() {
            "INNER" => JoinType::Inner,
            "LEFT" => JoinType::Left,
            "RIGHT" => JoinType::Right,
            "FULL" => JoinType::Full,
            "CROSS" => JoinType::Cross,
            _ => JoinType::Other(s.trim().to_string()),
        };
        Ok(join_type)
    }
}

impl From<String> for JoinType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(join_type) => join_type,
            Err(never) => match never {},
        }
    }
}

impl From<JoinType> for String {
    fn from(join_type: JoinType) -> Self {
        join_type.to_string()
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => f.write_str("INNER"),
            JoinType::Left => f.write_str("LEFT"),
            JoinType::Right => f.write_str("RIGHT"),
            JoinType::Full => f.write_str("FULL"),
            JoinType::Cross => f.write_str("CROSS"),
            JoinType::Other(keyword) => f.write_str(keyword),
        }
    }
}

/// One join applied onto the running FROM clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(rename = "type")]
    pub join_type: JoinType,
    pub table: String,
    /// Opaque boolean expression; empty for CROSS joins
    #[serde(default)]
    pub condition: String,
}

impl JoinSpec {
    pub fn new(join_type: JoinType, table: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            condition: condition.into(),
        }
    }
}

/// Column definition for CREATE TABLE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub type_tag: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }
}

/// Statement text plus the bound rows for an insert; never mutated once built
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    statement: String,
    rows: Option<Vec<Vec<Value>>>,
}

impl QueryPlan {
    /// A statement executed without bound values
    pub fn read(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            rows: None,
        }
    }

    /// An insert template executed with one batch of bound rows
    pub fn insert(template: impl Into<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            statement: template.into(),
            rows: Some(rows),
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn rows(&self) -> Option<&[Vec<Value>]> {
        self.rows.as_deref()
    }
}

/// Query Builder - pure statement assembly, no I/O
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn show_tables(database: Option<&str>) -> String {
        match database {
            Some(db) => format!("SHOW TABLES FROM {}", db),
            None => "SHOW TABLES".to_string(),
        }
    }

    pub fn describe(table: &str) -> String {
        format!("DESCRIBE TABLE {}", table)
    }

    /// `SELECT .. FROM .. [WHERE ..] [LIMIT ..]`; an empty column list selects `*`
    pub fn select<S: AsRef<str>>(
        columns: &[S],
        table: &str,
        filter: Option<&str>,
        limit: Option<u64>,
    ) -> String {
        let mut sql = format!("SELECT {} FROM {}", Self::column_list(columns), table);
        Self::push_filter(&mut sql, filter);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }

    /// `SELECT .. FROM main` followed by each join in the order given, then `WHERE`
    pub fn select_join<S: AsRef<str>>(
        columns: &[S],
        main_table: &str,
        joins: &[JoinSpec],
        filter: Option<&str>,
    ) -> String {
        let mut sql = format!("SELECT {} FROM {}", Self::column_list(columns), main_table);
        for join in joins {
            sql.push_str(&format!(" {} JOIN {}", join.join_type, join.table));
            if !join.condition.trim().is_empty() {
                sql.push_str(&format!(" ON {}", join.condition));
            }
        }
        Self::push_filter(&mut sql, filter);
        sql
    }

    /// Join query with the preview cap appended unconditionally
    pub fn join_preview<S: AsRef<str>>(
        columns: &[S],
        main_table: &str,
        joins: &[JoinSpec],
        filter: Option<&str>,
    ) -> String {
        let mut sql = Self::select_join(columns, main_table, joins, filter);
        sql.push_str(&format!(" LIMIT {}", JOIN_PREVIEW_LIMIT));
        sql
    }

    /// MergeTree CREATE TABLE; the primary key doubles as the sorting key
    pub fn create_table(table_name: &str, column_defs: &[ColumnDef], primary_key: Option<&str>) -> String {
        let mut parts: Vec<String> = column_defs
            .iter()
            .map(|c| format!("{} {}", c.name, c.type_tag))
            .collect();
        if let Some(pk) = primary_key {
            parts.push(format!("PRIMARY KEY ({})", pk));
        }

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree()",
            table_name,
            parts.join(", ")
        );
        if let Some(pk) = primary_key {
            sql.push_str(&format!(" ORDER BY {}", pk));
        }
        sql
    }

    /// Insert template; the rows are bound separately
    pub fn insert<S: AsRef<str>>(table_name: &str, columns: &[S]) -> String {
        let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        format!("INSERT INTO {} ({}) VALUES", table_name, columns.join(", "))
    }

    fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
        if columns.is_empty() {
            return "*".to_string();
        }
        columns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }

    fn push_filter(sql: &mut String, filter: Option<&str>) {
        if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
            sql.push_str(&format!(" WHERE {}", filter));
        }
    }
}
