//! PostgreSQL driver.

use crate::db::driver::{DriverConnection, ProviderFactory};
use crate::db::params::bind_postgres_param;
use crate::db::types::decode_postgres_row;
use crate::error::Result;
use crate::models::POSTGRES;
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, PgConnection};
use std::str::FromStr;

crate::impl_sqlx_driver!(PostgresDriver {
    connection: PgConnection,
    provider: POSTGRES,
    bind: bind_postgres_param,
    decode: decode_postgres_row,
    begin: "BEGIN",
    describe_in_transaction: false,
});

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresFactory;

#[async_trait]
impl ProviderFactory for PostgresFactory {
    fn name(&self) -> &'static str {
        POSTGRES
    }

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>> {
        let options = PgConnectOptions::from_str(connection_string)?;
        let conn = options.connect().await?;
        Ok(Box::new(PostgresDriver::new(conn)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DbType, Parameter, Value};

    fn test_url() -> Option<String> {
        std::env::var("TEST_POSTGRES_URL").ok()
    }

    #[tokio::test]
    async fn test_typed_null_parameters() {
        let Some(url) = test_url() else {
            eprintln!("Skipping: TEST_POSTGRES_URL not set");
            return;
        };

        let mut conn = PostgresFactory.connect(&url).await.unwrap();
        let params = vec![
            Parameter::nullable("$1", None::<i16>, DbType::Int16),
            Parameter::nullable("$2", "", DbType::AnsiString),
        ];
        let tables = conn
            .query("SELECT $1::int2 IS NULL AS a, $2::text IS NULL AS b", &params)
            .await
            .unwrap();

        let row = &tables[0].rows[0];
        assert_eq!(row.value(0), Some(&Value::Bool(true)));
        assert_eq!(row.value(1), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_decodes_numeric_and_temporal_columns() {
        let Some(url) = test_url() else {
            eprintln!("Skipping: TEST_POSTGRES_URL not set");
            return;
        };

        let mut conn = PostgresFactory.connect(&url).await.unwrap();
        let tables = conn
            .query(
                "SELECT 12.50::numeric AS price, DATE '2024-01-02' AS day, 7::int4 AS n",
                &[],
            )
            .await
            .unwrap();

        let row = &tables[0].rows[0];
        assert_eq!(row.get_by_name::<String>("price").unwrap(), "12.50");
        assert_eq!(row.get_by_name::<String>("day").unwrap(), "2024-01-02");
        assert_eq!(row.get_by_name::<i32>("n").unwrap(), 7);
    }
}
