//! Execution pipeline.
//!
//! Every execute operation follows the same sequence:
//!
//! 1. bind the driver command to the current text, parameters and transaction
//! 2. open the connection if it is closed
//! 3. run the pre-execute hooks
//! 4. make the driver call
//! 5. run the post-execute hooks, then map the result
//! 6. on failure in 2-5, run the unhandled-exception hooks and return the
//!    original error
//! 7. release: unless `keep_connection_open` is set, close an owned
//!    connection and clear the driver command
//!
//! Release happens on success and failure alike.

use crate::command::DatabaseCommand;
use crate::error::{Error, Result};
use crate::models::{DataSet, DataTable, FromValue, Record, Value};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Instant;
use tracing::{debug, warn};

/// Which driver call an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DriverCall {
    Execute,
    Query,
}

/// Raw driver output before mapping.
#[derive(Debug)]
pub(crate) enum DriverOutput {
    Affected(u64),
    Tables(Vec<DataTable>),
}

impl DriverOutput {
    fn into_tables(self) -> Vec<DataTable> {
        match self {
            Self::Tables(tables) => tables,
            Self::Affected(_) => vec![DataTable::default()],
        }
    }

    /// First row-producing result set.
    pub(crate) fn into_first_table(self) -> DataTable {
        self.into_tables().into_iter().next().unwrap_or_default()
    }

    fn affected(&self) -> u64 {
        match self {
            Self::Affected(n) => *n,
            Self::Tables(_) => 0,
        }
    }
}

impl DatabaseCommand {
    /// Steps 1 to 6 of the pipeline, without release.
    pub(crate) async fn dispatch(&mut self, call: DriverCall) -> Result<DriverOutput> {
        self.bind_command();
        match self.run_driver(call).await {
            Ok(output) => Ok(output),
            Err(e) => Err(self.notify_failure(e)),
        }
    }

    async fn run_driver(&mut self, call: DriverCall) -> Result<DriverOutput> {
        self.connection.open().await?;

        if let Some(transaction) = &self.transaction {
            if !transaction.belongs_to(&self.connection) {
                return Err(Error::transaction_mismatch(transaction.id().to_string()));
            }
            transaction.ensure_active()?;
        }

        self.hooks.run_pre_execute(self);

        let start = Instant::now();
        let output = {
            let mut driver = self.connection.driver().await?;
            let driver = driver.get()?;
            match call {
                DriverCall::Execute => {
                    DriverOutput::Affected(driver.execute(&self.text, &self.parameters).await?)
                }
                DriverCall::Query => {
                    DriverOutput::Tables(driver.query(&self.text, &self.parameters).await?)
                }
            }
        };

        debug!(
            connection_id = %self.connection.id(),
            call = ?call,
            params = self.parameters.len(),
            affected = output.affected(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Command executed"
        );

        self.hooks.run_post_execute(self);
        Ok(output)
    }

    /// Run the unhandled-exception hooks and hand the error back unchanged.
    pub(crate) fn notify_failure(&self, error: Error) -> Error {
        warn!(
            connection_id = %self.connection.id(),
            error = %error,
            "Command failed"
        );
        self.hooks.run_unhandled_exception(&error, self);
        error
    }

    /// Full pipeline: dispatch, map, release.
    async fn run<T, F>(&mut self, call: DriverCall, keep_connection_open: bool, map: F) -> Result<T>
    where
        F: FnOnce(DriverOutput) -> Result<T>,
    {
        let result = match self.dispatch(call).await {
            Ok(output) => match map(output) {
                Ok(value) => Ok(value),
                Err(e) => Err(self.notify_failure(e)),
            },
            Err(e) => Err(e),
        };
        self.release(keep_connection_open).await;
        result
    }

    /// First column of the first row, or `Value::Null` when there are no rows.
    pub async fn execute_scalar(&mut self, keep_connection_open: bool) -> Result<Value> {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            Ok(output.into_first_table().scalar())
        })
        .await
    }

    /// Scalar converted to `T`. Conversion failures go through the
    /// unhandled-exception hooks like driver errors.
    pub async fn execute_scalar_as<T: FromValue>(&mut self, keep_connection_open: bool) -> Result<T> {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            T::from_value(&output.into_first_table().scalar())
        })
        .await
    }

    /// Number of rows affected.
    pub async fn execute_non_query(&mut self, keep_connection_open: bool) -> Result<u64> {
        self.run(DriverCall::Execute, keep_connection_open, |output| {
            Ok(output.affected())
        })
        .await
    }

    /// Call `callback` once per record, in result order.
    pub async fn execute_reader<F>(&mut self, keep_connection_open: bool, mut callback: F) -> Result<()>
    where
        F: FnMut(&Record),
    {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            for record in &output.into_first_table().rows {
                callback(record);
            }
            Ok(())
        })
        .await
    }

    /// Project every record; the first projection error aborts the mapping.
    pub async fn execute_to_map<T, F>(&mut self, keep_connection_open: bool, mut projection: F) -> Result<Vec<T>>
    where
        F: FnMut(&Record) -> Result<T>,
    {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            output
                .into_first_table()
                .rows
                .iter()
                .map(&mut projection)
                .collect()
        })
        .await
    }

    /// First record mapped onto `T` by column name, or `None` without rows.
    pub async fn execute_to_object<T: DeserializeOwned>(&mut self, keep_connection_open: bool) -> Result<Option<T>> {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            output
                .into_first_table()
                .rows
                .first()
                .map(Record::to_object)
                .transpose()
        })
        .await
    }

    /// Every record mapped onto `T` by column name.
    pub async fn execute_to_list<T: DeserializeOwned>(&mut self, keep_connection_open: bool) -> Result<Vec<T>> {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            output
                .into_first_table()
                .rows
                .iter()
                .map(Record::to_object)
                .collect()
        })
        .await
    }

    /// Every record as a JSON object keyed by column name.
    pub async fn execute_to_dynamic(
        &mut self,
        keep_connection_open: bool,
    ) -> Result<Vec<serde_json::Map<String, JsonValue>>> {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            Ok(output
                .into_first_table()
                .rows
                .iter()
                .map(Record::to_json_map)
                .collect())
        })
        .await
    }

    /// First row-producing result set.
    pub async fn execute_to_data_table(&mut self, keep_connection_open: bool) -> Result<DataTable> {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            Ok(output.into_first_table())
        })
        .await
    }

    /// Every row-producing result set, in order.
    pub async fn execute_to_data_set(&mut self, keep_connection_open: bool) -> Result<DataSet> {
        self.run(DriverCall::Query, keep_connection_open, |output| {
            Ok(DataSet::new(output.into_tables()))
        })
        .await
    }
}
