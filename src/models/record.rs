//! Result shapes: records, tables and sets of tables.

use crate::error::{Error, Result};
use crate::models::value::{FromValue, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// One row of a result set.
///
/// Column names are shared by every record of the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Raw value by ordinal.
    pub fn value(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Ordinal of a column, compared case-insensitively.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    /// Typed value by ordinal.
    pub fn get<T: FromValue>(&self, idx: usize) -> Result<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            Error::mapping(format!(
                "column index {} out of bounds (len: {})",
                idx,
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Typed value by column name.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        let idx = self
            .ordinal(name)
            .ok_or_else(|| Error::mapping(format!("column not found: {name}")))?;
        self.get(idx)
    }

    pub fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }

    /// Map the record onto a deserializable type by column name.
    pub fn to_object<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(JsonValue::Object(self.to_json_map())).map_err(Error::from)
    }
}

/// A single result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl DataTable {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, if any.
    pub fn scalar(&self) -> Value {
        self.rows
            .first()
            .and_then(|r| r.value(0))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.rows
    }
}

/// Every row-producing result set of a command, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    pub tables: Vec<DataTable>,
}

impl DataSet {
    pub fn new(tables: Vec<DataTable>) -> Self {
        Self { tables }
    }

    pub fn table(&self, idx: usize) -> Option<&DataTable> {
        self.tables.get(idx)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// JSON view of a table, used by the CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct TableJson {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
}

impl From<&DataTable> for TableJson {
    fn from(table: &DataTable) -> Self {
        Self {
            columns: table.columns.clone(),
            rows: table.rows.iter().map(Record::to_json_map).collect(),
        }
    }
}
