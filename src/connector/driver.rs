//! Driver seam - how a connector reaches the store
//!
//! Implementations:
//! - HttpDriver: ClickHouse HTTP interface over blocking reqwest
//! - in-memory fakes in the integration tests

use crate::config::ConnectionParams;
use crate::query_builder::QueryPlan;
use crate::table::{parse_timestamp, Value};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Fault reported by the store or the transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    /// Server exception code, when the store supplied one
    pub code: Option<u32>,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Column name and declared store type of a result column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Rows as returned by the store, already decoded into scalar values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Opens sessions. One connect call is one connection attempt.
pub trait Driver {
    type Session: Session;

    fn connect(&self, params: &ConnectionParams) -> Result<Self::Session, DriverError>;
}

/// An established session
pub trait Session {
    /// Run a plan. Insert plans carry their rows; everything else returns rows.
    fn execute(&mut self, plan: &QueryPlan) -> Result<ResultSet, DriverError>;
}

/// Decode one JSON cell according to its declared ClickHouse type
pub fn decode_cell(type_name: &str, cell: &JsonValue) -> Value {
    if cell.is_null() {
        return Value::Null;
    }

    let base = base_type(type_name);

    if is_integer_type(base) {
        if let Some(i) = cell.as_i64() {
            return Value::Int(i);
        }
        if let Some(s) = cell.as_str() {
            if let Ok(i) = s.parse::<i64>() {
                return Value::Int(i);
            }
            if let Ok(f) = s.parse::<f64>() {
                return Value::Float(f);
            }
        }
        if let Some(f) = cell.as_f64() {
            return Value::Float(f);
        }
    } else if base.starts_with("Float") || base.starts_with("Decimal") {
        if let Some(f) = cell.as_f64() {
            return Value::Float(f);
        }
        if let Some(f) = cell.as_str().and_then(|s| s.parse::<f64>().ok()) {
            return Value::Float(f);
        }
    } else if base == "Bool" {
        match cell {
            JsonValue::Bool(b) => return Value::Bool(*b),
            JsonValue::Number(n) => return Value::Bool(n.as_i64().unwrap_or(0) != 0),
            _ => {}
        }
    } else if base.starts_with("Date") {
        if let Some(ts) = cell.as_str().and_then(parse_timestamp) {
            return Value::Timestamp(ts);
        }
    }

    match cell {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Bool(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}

/// Strip `Nullable(..)` / `LowCardinality(..)` wrappers
fn base_type(type_name: &str) -> &str {
    let mut t = type_name.trim();
    loop {
        let inner = ["Nullable(", "LowCardinality("]
            .iter()
            .find_map(|prefix| t.strip_prefix(*prefix))
            .and_then(|rest| rest.strip_suffix(')'));
        match inner {
            Some(inner) => t = inner.trim(),
            None => return t,
        }
    }
}

fn is_integer_type(base: &str) -> bool {
    ["Int", "UInt"].iter().any(|prefix| {
        base.strip_prefix(*prefix)
            .map(|bits| !bits.is_empty() && bits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_type_unwraps_wrappers() {
        assert_eq!(base_type("Nullable(Int64)"), "Int64");
        assert_eq!(base_type("LowCardinality(Nullable(String))"), "String");
        assert_eq!(base_type("DateTime('UTC')"), "DateTime('UTC')");
    }

    #[test]
    fn test_decode_integers() {
        assert_eq!(decode_cell("Int64", &json!(42)), Value::Int(42));
        assert_eq!(decode_cell("UInt8", &json!(1)), Value::Int(1));
        assert_eq!(decode_cell("Int64", &json!("-9")), Value::Int(-9));
        assert_eq!(
            decode_cell("UInt64", &json!(18446744073709551615u64)),
            Value::Float(18446744073709551615u64 as f64)
        );
        assert_eq!(decode_cell("Nullable(Int32)", &json!(null)), Value::Null);
    }

    #[test]
    fn test_decode_floats_bools_and_dates() {
        assert_eq!(decode_cell("Float64", &json!(1.5)), Value::Float(1.5));
        assert_eq!(decode_cell("Decimal(10, 2)", &json!("3.25")), Value::Float(3.25));
        assert_eq!(decode_cell("Bool", &json!(true)), Value::Bool(true));
        assert_eq!(
            decode_cell("DateTime", &json!("2024-01-02 03:04:05")),
            Value::Timestamp(parse_timestamp("2024-01-02 03:04:05").unwrap())
        );
        assert_eq!(
            decode_cell("Date", &json!("2024-01-02")),
            Value::Timestamp(parse_timestamp("2024-01-02").unwrap())
        );
    }

    #[test]
    fn test_decode_other_types_as_strings() {
        assert_eq!(decode_cell("String", &json!("abc")), Value::String("abc".to_string()));
        assert_eq!(decode_cell("UUID", &json!("61f0c404")), Value::String("61f0c404".to_string()));
        assert_eq!(decode_cell("Array(Int32)", &json!([1, 2])), Value::String("[1,2]".to_string()));
        assert_eq!(decode_cell("Interval", &json!(5)), Value::String("5".to_string()));
    }
}
