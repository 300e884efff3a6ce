use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Column types supported by the schema lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    BigInt,
    Boolean,
    Double,
}

impl ColumnType {
    /// Postgres type name used in DDL.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Text => "varchar",
            ColumnType::BigInt => "bigint",
            ColumnType::Boolean => "boolean",
            ColumnType::Double => "double precision",
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value can be stored in a column of `column_type`.
    pub fn fits(&self, column_type: ColumnType) -> bool {
        matches!(
            (self, column_type),
            (Value::Null, _)
                | (Value::Text(_), ColumnType::Text)
                | (Value::Int(_), ColumnType::BigInt)
                | (Value::Int(_), ColumnType::Double)
                | (Value::Float(_), ColumnType::Double)
                | (Value::Bool(_), ColumnType::Boolean)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "unknown",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "bigint",
            Value::Float(_) => "double precision",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One entity instance, keyed by column name. Absent columns read as NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&Value::Null)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Values of `columns` in order, used for key comparisons.
    pub fn key(&self, columns: &[String]) -> Vec<Value> {
        columns.iter().map(|column| self.get(column).clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_columns_read_as_null() {
        let row = Row::new().with("id", "C001").with("parent_id", None::<&str>);
        assert_eq!(row.get("id"), &Value::Text("C001".to_string()));
        assert!(row.get("parent_id").is_null());
        assert!(row.get("missing").is_null());
        assert!(!row.contains("missing"));
    }

    #[test]
    fn values_check_column_compatibility() {
        assert!(Value::Int(3).fits(ColumnType::Double));
        assert!(Value::Null.fits(ColumnType::BigInt));
        assert!(!Value::Text("3".to_string()).fits(ColumnType::BigInt));
        assert!(!Value::Float(1.5).fits(ColumnType::BigInt));
    }

    #[test]
    fn rows_serialize_as_plain_objects() {
        let row = Row::new().with("id", 7_i64).with("name", "Jeans");
        let json = serde_json::to_string(&row).expect("serialize row");
        assert_eq!(json, r#"{"id":7,"name":"Jeans"}"#);
    }
}
