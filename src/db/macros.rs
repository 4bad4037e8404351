//! Driver generation macro.
//!
//! The sqlx backends only differ in their connection type, parameter binding,
//! row decoding, the statement that opens a transaction and whether a failed
//! describe is harmless inside a transaction. This macro
//! generates one [`DriverConnection`](crate::db::DriverConnection)
//! implementation per backend from those pieces.

/// Generate a sqlx-backed driver connection.
///
/// # Example
///
/// ```ignore
/// impl_sqlx_driver!(SqliteDriver {
///     connection: sqlx::SqliteConnection,
///     provider: SQLITE,
///     bind: bind_sqlite_param,
///     decode: decode_sqlite_row,
///     begin: "BEGIN",
///     describe_in_transaction: true,
/// });
/// ```
#[macro_export]
macro_rules! impl_sqlx_driver {
    ($name:ident {
        connection: $conn:ty,
        provider: $provider:expr,
        bind: $bind:path,
        decode: $decode:path,
        begin: $begin:expr,
        describe_in_transaction: $describe_in_tx:expr $(,)?
    }) => {
        pub struct $name {
            conn: $conn,
            provider: &'static str,
            in_transaction: bool,
        }

        impl $name {
            pub fn new(conn: $conn) -> Self {
                Self::with_provider(conn, $provider)
            }

            pub fn with_provider(conn: $conn, provider: &'static str) -> Self {
                Self {
                    conn,
                    provider,
                    in_transaction: false,
                }
            }
        }

        #[async_trait::async_trait]
        impl $crate::db::DriverConnection for $name {
            fn provider(&self) -> &'static str {
                self.provider
            }

            async fn execute(
                &mut self,
                sql: &str,
                params: &[$crate::models::Parameter],
            ) -> $crate::error::Result<u64> {
                use sqlx::Executor;

                let result = if params.is_empty() {
                    // raw text so multi-statement batches run unprepared
                    (&mut self.conn).execute(sql).await?
                } else {
                    let mut query = sqlx::query(sql);
                    for param in params {
                        query = $bind(query, param);
                    }
                    query.execute(&mut self.conn).await?
                };
                Ok(result.rows_affected())
            }

            async fn query(
                &mut self,
                sql: &str,
                params: &[$crate::models::Parameter],
            ) -> $crate::error::Result<Vec<$crate::models::DataTable>> {
                use futures_util::TryStreamExt;
                use sqlx::Executor;
                use sqlx::Either;

                let mut builder = $crate::db::driver::ResultSetBuilder::new();
                {
                    let mut stream = if params.is_empty() {
                        (&mut self.conn).fetch_many(sql)
                    } else {
                        let mut query = sqlx::query(sql);
                        for param in params {
                            query = $bind(query, param);
                        }
                        (&mut self.conn).fetch_many(query)
                    };

                    while let Some(item) = stream.try_next().await? {
                        match item {
                            Either::Left(_) => builder.end_result_set(),
                            Either::Right(row) => builder.push_row(
                                || $crate::db::types::column_names(&row),
                                $decode(&row),
                            ),
                        }
                    }
                }

                // no rows anywhere: recover the columns of the first
                // row-producing statement from the driver's metadata
                if builder.is_empty() && ($describe_in_tx || !self.in_transaction) {
                    use sqlx::Column;

                    for statement in $crate::db::driver::split_statements(sql) {
                        match (&mut self.conn).describe(statement).await {
                            Ok(describe) if !describe.columns().is_empty() => {
                                builder.start_result_set(
                                    describe
                                        .columns()
                                        .iter()
                                        .map(|column| column.name().to_string())
                                        .collect(),
                                );
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => tracing::debug!(
                                error = %e,
                                "Could not describe statement"
                            ),
                        }
                    }
                }

                Ok(builder.finish())
            }

            async fn ping(&mut self) -> $crate::error::Result<()> {
                use sqlx::Connection;
                self.conn.ping().await?;
                Ok(())
            }

            async fn begin(&mut self) -> $crate::error::Result<()> {
                use sqlx::Executor;
                (&mut self.conn).execute($begin).await?;
                self.in_transaction = true;
                Ok(())
            }

            async fn commit(&mut self) -> $crate::error::Result<()> {
                use sqlx::Executor;
                (&mut self.conn).execute("COMMIT").await?;
                self.in_transaction = false;
                Ok(())
            }

            async fn rollback(&mut self) -> $crate::error::Result<()> {
                use sqlx::Executor;
                (&mut self.conn).execute("ROLLBACK").await?;
                self.in_transaction = false;
                Ok(())
            }

            async fn close(self: Box<Self>) -> $crate::error::Result<()> {
                use sqlx::Connection;
                self.conn.close().await?;
                Ok(())
            }
        }
    };
}

pub use impl_sqlx_driver;
