//! Type Mapper - File-domain scalar categories to ClickHouse column types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar category of a column's values in an in-memory table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainType {
    Int64,
    Float64,
    Bool,
    Timestamp,
    Other,
}

impl DomainType {
    /// Classify a type name: our own `Display` output, or a free-form dtype
    /// name such as "datetime64[ns, UTC]".
    ///
    /// Exact names are checked first; timestamp-like names match by substring.
    pub fn from_name(name: &str) -> Self {
        let lowered = name.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "int64" | "i64" => return DomainType::Int64,
            "float64" | "f64" => return DomainType::Float64,
            "bool" | "boolean" => return DomainType::Bool,
            _ => {}
        }

        if ["datetime", "timestamp", "date"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            DomainType::Timestamp
        } else {
            DomainType::Other
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DomainType::Int64 => "int64",
            DomainType::Float64 => "float64",
            DomainType::Bool => "bool",
            DomainType::Timestamp => "timestamp",
            DomainType::Other => "other",
        };
        f.write_str(name)
    }
}

/// Map a domain type to the ClickHouse type used in CREATE TABLE.
///
/// Total: anything without a dedicated mapping is stored as `String`.
pub fn map_type(domain_type: DomainType) -> &'static str {
    match domain_type {
        DomainType::Int64 => "Int64",
        DomainType::Float64 => "Float64",
        DomainType::Bool => "UInt8",
        DomainType::Timestamp => "DateTime",
        DomainType::Other => "String",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_type_covers_every_category() {
        assert_eq!(map_type(DomainType::Int64), "Int64");
        assert_eq!(map_type(DomainType::Float64), "Float64");
        assert_eq!(map_type(DomainType::Bool), "UInt8");
        assert_eq!(map_type(DomainType::Timestamp), "DateTime");
        assert_eq!(map_type(DomainType::Other), "String");
    }

    #[test]
    fn test_timestamp_names_match_by_substring() {
        assert_eq!(map_type(DomainType::from_name("datetime64[ns]")), "DateTime");
        assert_eq!(map_type(DomainType::from_name("datetime64[ns, UTC]")), "DateTime");
        assert_eq!(map_type(DomainType::from_name("Timestamp")), "DateTime");
        assert_eq!(map_type(DomainType::from_name("date")), "DateTime");
    }

    #[test]
    fn test_unknown_names_fall_through_to_string() {
        assert_eq!(map_type(DomainType::from_name("object")), "String");
        assert_eq!(map_type(DomainType::from_name("category")), "String");
        assert_eq!(map_type(DomainType::from_name("int32")), "String");
        assert_eq!(map_type(DomainType::from_name("")), "String");
    }

    #[test]
    fn test_display_names_parse_back() {
        for t in [
            DomainType::Int64,
            DomainType::Float64,
            DomainType::Bool,
            DomainType::Timestamp,
            DomainType::Other,
        ] {
            assert_eq!(DomainType::from_name(&t.to_string()), t);
        }
    }

    #[test]
    fn test_map_type_is_deterministic() {
        for name in ["int64", "float64", "bool", "datetime64[ns]", "object"] {
            assert_eq!(map_type(DomainType::from_name(name)), map_type(DomainType::from_name(name)));
        }
    }
}
