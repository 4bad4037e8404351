//! Fluent DB Library
//!
//! This library provides a fluent, provider-agnostic command layer over SQL
//! database drivers (SQL Server, MySQL, PostgreSQL, SQLite), with execution
//! hooks, named connections and scoped connection release.

pub mod command;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod hooks;
pub mod models;

pub use command::{DatabaseCommand, Ownership, RecordStream};
pub use config::Config;
pub use context::DbContext;
pub use db::{DbConnection, Transaction};
pub use error::{Error, Result};
pub use hooks::HookRegistry;
pub use models::{DataSet, DataTable, DbType, Parameter, Record, Value};
