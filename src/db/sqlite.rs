//! SQLite drivers: file-backed and private in-memory databases.

use crate::db::driver::{DriverConnection, ProviderFactory};
use crate::db::params::bind_sqlite_param;
use crate::db::types::decode_sqlite_row;
use crate::error::Result;
use crate::models::{SQLITE, SQLITE_MEMORY};
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};
use std::str::FromStr;
use tracing::debug;

crate::impl_sqlx_driver!(SqliteDriver {
    connection: SqliteConnection,
    provider: SQLITE,
    bind: bind_sqlite_param,
    decode: decode_sqlite_row,
    begin: "BEGIN",
    describe_in_transaction: true,
});

/// Opens SQLite database files, creating them when missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteFactory;

#[async_trait]
impl ProviderFactory for SqliteFactory {
    fn name(&self) -> &'static str {
        SQLITE
    }

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>> {
        let options = SqliteConnectOptions::from_str(connection_string)?.create_if_missing(true);
        let conn = options.connect().await?;
        Ok(Box::new(SqliteDriver::new(conn)))
    }
}

/// Opens a fresh in-memory SQLite database for every connection.
///
/// The connection string is only a label; two connections never share data.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteMemoryFactory;

#[async_trait]
impl ProviderFactory for SqliteMemoryFactory {
    fn name(&self) -> &'static str {
        SQLITE_MEMORY
    }

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>> {
        debug!(label = %connection_string, "Opening in-memory SQLite database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let conn = options.connect().await?;
        Ok(Box::new(SqliteDriver::with_provider(conn, SQLITE_MEMORY)))
    }
}
