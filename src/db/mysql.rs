//! MySQL / MariaDB driver.

use crate::db::driver::{DriverConnection, ProviderFactory};
use crate::db::params::bind_mysql_param;
use crate::db::types::decode_mysql_row;
use crate::error::Result;
use crate::models::MYSQL;
use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, MySqlConnection};
use std::str::FromStr;

crate::impl_sqlx_driver!(MySqlDriver {
    connection: MySqlConnection,
    provider: MYSQL,
    bind: bind_mysql_param,
    decode: decode_mysql_row,
    begin: "START TRANSACTION",
    describe_in_transaction: true,
});

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlFactory;

#[async_trait]
impl ProviderFactory for MySqlFactory {
    fn name(&self) -> &'static str {
        MYSQL
    }

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>> {
        let options = MySqlConnectOptions::from_str(connection_string)?.charset("utf8mb4");
        let conn = options.connect().await?;
        Ok(Box::new(MySqlDriver::new(conn)))
    }
}
