//! In-memory Table - the interchange format between file codecs and the connector

use crate::error::{IngestError, Result};
use crate::type_mapper::DomainType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// One row as an insertion-ordered column → value mapping (external preview contract)
pub type RowMap = serde_json::Map<String, JsonValue>;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single scalar cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Domain category of this value, `None` for nulls
    pub fn domain_type(&self) -> Option<DomainType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DomainType::Bool),
            Value::Int(_) => Some(DomainType::Int64),
            Value::Float(_) => Some(DomainType::Float64),
            Value::Timestamp(_) => Some(DomainType::Timestamp),
            Value::String(_) => Some(DomainType::Other),
        }
    }

    /// Coerce a text cell: empty → null, then bool, int, float, timestamp, string.
    pub fn parse_text(s: &str) -> Value {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }

        if let Some(ts) = parse_timestamp(trimmed) {
            return Value::Timestamp(ts);
        }

        Value::String(s.to_string())
    }

    pub fn from_json(value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    n.as_f64().map(Value::Float).unwrap_or(Value::Null)
                }
            }
            JsonValue::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Timestamp(ts) => JsonValue::String(format_timestamp_iso(ts)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::String(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
        }
    }
}

/// Parse the timestamp shapes we write and the ones ClickHouse returns.
///
/// Date-only strings become midnight of that day.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // cheap reject before trying every format
    if s.len() < 10 || !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// The one shape timestamps take in JSON output
pub fn format_timestamp_iso(ts: &NaiveDateTime) -> String {
    ts.format(ISO_TIMESTAMP_FORMAT).to_string()
}

/// Strict inverse of [`format_timestamp_iso`]
pub fn parse_timestamp_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, ISO_TIMESTAMP_FORMAT).ok()
}

/// Integral floats keep a trailing `.0` so text round-trips preserve the float type.
pub fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        x.to_string()
    }
}

/// In-memory table: unique ordered column names + rows in column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table. Duplicate or blank names are renamed so names stay unique.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: unique_column_names(columns.into_iter().map(Into::into).collect()),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(IngestError::Schema(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Observed domain type of a column.
    ///
    /// Ints alone → Int64, ints mixed with floats → Float64, a single other
    /// category → that category, anything else (mixed or all-null) → Other.
    pub fn domain_type(&self, index: usize) -> DomainType {
        let seen: HashSet<DomainType> = self
            .column_values(index)
            .filter_map(Value::domain_type)
            .collect();

        if seen.len() == 1 {
            return seen.into_iter().next().unwrap_or(DomainType::Other);
        }
        if seen.len() == 2 && seen.contains(&DomainType::Int64) && seen.contains(&DomainType::Float64) {
            return DomainType::Float64;
        }
        DomainType::Other
    }

    pub fn domain_types(&self) -> Vec<DomainType> {
        (0..self.columns.len()).map(|i| self.domain_type(i)).collect()
    }

    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    /// Replace every cell of one column
    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(index) {
                *cell = f(cell);
            }
        }
    }

    /// Cells as the store will see them: every non-null cell of an
    /// `Other` column becomes its text, matching the `String` column type.
    pub fn rows_for_insert(&self) -> Vec<Vec<Value>> {
        let text_columns: Vec<bool> = self
            .domain_types()
            .into_iter()
            .map(|t| t == DomainType::Other)
            .collect();

        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&text_columns)
                    .map(|(value, &as_text)| match value {
                        Value::Null | Value::String(_) => value.clone(),
                        other if as_text => Value::String(other.to_string()),
                        other => other.clone(),
                    })
                    .collect()
            })
            .collect()
    }

    /// Promote ints to floats in any column that mixes the two.
    pub fn promote_mixed_numeric(&mut self) {
        for index in 0..self.columns.len() {
            if self.domain_type(index) != DomainType::Float64 {
                continue;
            }
            for row in &mut self.rows {
                if let Value::Int(i) = row[index] {
                    row[index] = Value::Float(i as f64);
                }
            }
        }
    }

    pub fn to_row_maps(&self) -> Vec<RowMap> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect()
            })
            .collect()
    }
}

fn unique_column_names(names: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    for (idx, name) in names.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("unnamed_{}", idx)
        } else {
            name
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while used.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        if candidate != base {
            warn!("Duplicate column name '{}' renamed to '{}'", base, candidate);
        }

        used.insert(candidate.clone());
        out.push(candidate);
    }

    out
}
