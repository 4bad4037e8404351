//! Column decoding.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the driver's column type name
//! 2. Backend-specific decoders extract the value into a [`Value`]
//!
//! SQLite is the exception: its columns are decoded by the storage class of
//! the value actually returned, since declared types are only advisory.

use crate::models::Value;
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") || lower == "money" {
        return TypeCategory::Decimal;
    }

    // before the integer check: "tinyblob", "tinytext", "interval"
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char")
        || lower.contains("text")
        || lower.contains("interval")
        || lower == "name"
    {
        return TypeCategory::Text;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" || lower == "bit" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("timestamp")
        || lower.contains("datetime")
        || lower == "date"
        || lower == "time"
        || lower == "timetz"
    {
        return TypeCategory::Temporal;
    }

    TypeCategory::Unknown
}

pub(crate) fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn float_value(v: f64) -> Value {
    Value::Float(v)
}

fn u64_value(v: u64) -> Value {
    i64::try_from(v)
        .map(Value::Int)
        .unwrap_or_else(|_| Value::Text(v.to_string()))
}

/// Log a cell no decoder could read and stand in NULL for it.
pub(crate) fn undecoded(index: usize, type_name: &str) -> Value {
    tracing::warn!(
        column = index,
        type_name,
        "Column value could not be decoded, returning NULL"
    );
    Value::Null
}

/// A NULL decoded from a non-NULL cell means every decoder rejected it.
fn check_decoded(value: Value, raw_is_null: bool, index: usize, type_name: &str) -> Value {
    if value.is_null() && !raw_is_null {
        undecoded(index, type_name)
    } else {
        value
    }
}

fn naive_datetime_text(v: chrono::NaiveDateTime) -> Value {
    Value::Text(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

// =============================================================================
// MySQL
// =============================================================================

pub(crate) fn decode_mysql_row(row: &MySqlRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let type_name = col.type_info().name();
            let value = mysql::decode_column(row, idx, categorize_type(type_name));
            let raw_is_null = row.try_get_raw(idx).is_ok_and(|raw| raw.is_null());
            check_decoded(value, raw_is_null, idx, type_name)
        })
        .collect()
}

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<rust_decimal::Decimal>, _>(idx)
            .ok()
            .flatten()
            .map(|d| Value::Text(d.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return v.map(|v| Value::Int(v.into())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return v.map(u64_value).unwrap_or(Value::Null);
        }
        Value::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(float_value).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.into();
        }
        Value::Null
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null)
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return v.map(|v| Value::Text(v.to_rfc3339())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v.map(naive_datetime_text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v.map(|v| Value::Text(v.to_string())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return v.map(|v| Value::Text(v.to_string())).unwrap_or(Value::Null);
        }
        decode_text(row, idx)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.into();
        }
        // VARBINARY-backed strings, e.g. from CONCAT on binary collations
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| match String::from_utf8(v) {
                Ok(s) => Value::Text(s),
                Err(e) => Value::Bytes(e.into_bytes()),
            })
            .unwrap_or(Value::Null)
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

pub(crate) fn decode_postgres_row(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let type_name = col.type_info().name();
            let value = postgres::decode_column(row, idx, categorize_type(type_name));
            let raw_is_null = row.try_get_raw(idx).is_ok_and(|raw| raw.is_null());
            check_decoded(value, raw_is_null, idx, type_name)
        })
        .collect()
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<rust_decimal::Decimal>, _>(idx)
            .ok()
            .flatten()
            .map(|d| Value::Text(d.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.into();
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.into();
        }
        Value::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(float_value).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.into();
        }
        Value::Null
    }

    fn decode_binary(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return v.map(|v| Value::Text(v.to_rfc3339())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v.map(naive_datetime_text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v.map(|v| Value::Text(v.to_string())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return v.map(|v| Value::Text(v.to_string())).unwrap_or(Value::Null);
        }
        Value::Null
    }

    fn decode_text(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null)
    }
}

// =============================================================================
// SQLite
// =============================================================================

pub(crate) fn decode_sqlite_row(row: &SqliteRow) -> Vec<Value> {
    (0..row.columns().len())
        .map(|idx| decode_sqlite_column(row, idx))
        .collect()
}

fn decode_sqlite_column(row: &SqliteRow, idx: usize) -> Value {
    let storage = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(e) => {
            tracing::warn!(column = idx, error = %e, "Failed to read SQLite column");
            return Value::Null;
        }
    };
    let declared_name = row.column(idx).type_info().name();
    let declared = categorize_type(declared_name);

    let value = match storage.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(idx).map(|v| {
            if declared == TypeCategory::Boolean {
                Value::Bool(v != 0)
            } else {
                Value::Int(v)
            }
        }),
        "REAL" => row.try_get_unchecked::<f64, _>(idx).map(Value::Float),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(idx).map(Value::Bytes),
        _ => row.try_get_unchecked::<String, _>(idx).map(|v| {
            if declared == TypeCategory::Json {
                serde_json::from_str(&v)
                    .map(Value::Json)
                    .unwrap_or(Value::Text(v))
            } else {
                Value::Text(v)
            }
        }),
    };

    value.unwrap_or_else(|e| {
        tracing::debug!(column = idx, storage = %storage, error = %e, "SQLite decode failed");
        undecoded(idx, declared_name)
    })
}
