//! Parameter binding for the sqlx drivers.
//!
//! Parameters bind positionally. A null is bound with the Rust type matching
//! the declared [`DbType`] so strictly typed servers (PostgreSQL) accept it.
//! Integers and floats are narrowed to the declared width when they fit.

use crate::models::{DbType, Parameter, Value};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;
type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;
type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Width an integer parameter should be bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntWidth {
    I16(i16),
    I32(i32),
    I64(i64),
}

pub(crate) fn int_width(value: i64, db_type: DbType) -> IntWidth {
    match db_type {
        DbType::Int16 => i16::try_from(value)
            .map(IntWidth::I16)
            .unwrap_or(IntWidth::I64(value)),
        DbType::Int32 => i32::try_from(value)
            .map(IntWidth::I32)
            .unwrap_or(IntWidth::I64(value)),
        _ => IntWidth::I64(value),
    }
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(query: MySqlQuery<'q>, param: &'q Parameter) -> MySqlQuery<'q> {
    match &param.value {
        Value::Null => bind_mysql_null(query, param.db_type),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => match int_width(*v, param.db_type) {
            IntWidth::I16(v) => query.bind(v),
            IntWidth::I32(v) => query.bind(v),
            IntWidth::I64(v) => query.bind(v),
        },
        Value::Float(v) if param.db_type == DbType::Single => query.bind(*v as f32),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Json(v) => query.bind(Json(v)),
    }
}

fn bind_mysql_null(query: MySqlQuery<'_>, db_type: DbType) -> MySqlQuery<'_> {
    match db_type {
        DbType::AnsiString | DbType::String => query.bind(None::<String>),
        DbType::Boolean => query.bind(None::<bool>),
        DbType::Int16 => query.bind(None::<i16>),
        DbType::Int32 => query.bind(None::<i32>),
        DbType::Int64 => query.bind(None::<i64>),
        DbType::Single => query.bind(None::<f32>),
        DbType::Double => query.bind(None::<f64>),
        DbType::Binary => query.bind(None::<Vec<u8>>),
        DbType::Json => query.bind(None::<Json<JsonValue>>),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(query: PgQuery<'q>, param: &'q Parameter) -> PgQuery<'q> {
    match &param.value {
        Value::Null => bind_postgres_null(query, param.db_type),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => match int_width(*v, param.db_type) {
            IntWidth::I16(v) => query.bind(v),
            IntWidth::I32(v) => query.bind(v),
            IntWidth::I64(v) => query.bind(v),
        },
        Value::Float(v) if param.db_type == DbType::Single => query.bind(*v as f32),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Json(v) => query.bind(Json(v)),
    }
}

fn bind_postgres_null(query: PgQuery<'_>, db_type: DbType) -> PgQuery<'_> {
    match db_type {
        DbType::AnsiString | DbType::String => query.bind(None::<String>),
        DbType::Boolean => query.bind(None::<bool>),
        DbType::Int16 => query.bind(None::<i16>),
        DbType::Int32 => query.bind(None::<i32>),
        DbType::Int64 => query.bind(None::<i64>),
        DbType::Single => query.bind(None::<f32>),
        DbType::Double => query.bind(None::<f64>),
        DbType::Binary => query.bind(None::<Vec<u8>>),
        DbType::Json => query.bind(None::<Json<JsonValue>>),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(query: SqliteQuery<'q>, param: &'q Parameter) -> SqliteQuery<'q> {
    match &param.value {
        // SQLite has a single untyped NULL
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        // SQLite doesn't have native JSON type, store as string
        Value::Json(v) => query.bind(v.to_string()),
    }
}
