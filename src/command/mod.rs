//! The command wrapper.
//!
//! A [`DatabaseCommand`] owns (or borrows) one connection, an optional
//! prepared [`DbCommand`] and an optional transaction, plus the SQL text and
//! parameters set through its fluent methods. Every execute operation runs
//! through the pipeline in [`execute`].

pub mod execute;
pub mod stream;

use crate::db::{DbConnection, Transaction};
use crate::hooks::HookRegistry;
use crate::models::{DbType, Parameter, Value};
use tracing::debug;
use uuid::Uuid;

pub use stream::RecordStream;

/// Whether the command closes its connection when it releases resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The command opened the connection and closes it.
    Owned,
    /// The caller supplied the connection and keeps it open.
    Borrowed,
}

/// Driver command bound to a connection: the text, parameters and
/// transaction that will be sent on the next execution.
#[derive(Debug, Clone, PartialEq)]
pub struct DbCommand {
    pub connection_id: Uuid,
    pub text: String,
    pub parameters: Vec<Parameter>,
    pub transaction_id: Option<Uuid>,
}

/// Fluent command wrapper.
///
/// One wrapper runs one logical operation at a time.
pub struct DatabaseCommand {
    connection: DbConnection,
    ownership: Ownership,
    command: Option<DbCommand>,
    text: String,
    parameters: Vec<Parameter>,
    transaction: Option<Transaction>,
    hooks: HookRegistry,
}

impl std::fmt::Debug for DatabaseCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseCommand")
            .field("connection", &self.connection)
            .field("ownership", &self.ownership)
            .field("command", &self.command)
            .field("transaction", &self.transaction)
            .finish()
    }
}

impl DatabaseCommand {
    /// Wrap a connection the command owns and closes after each execution.
    pub fn owned(connection: DbConnection, hooks: HookRegistry) -> Self {
        Self::new(connection, Ownership::Owned, hooks)
    }

    /// Wrap a caller-supplied connection; the command never closes it.
    pub fn borrowed(connection: DbConnection, hooks: HookRegistry) -> Self {
        Self::new(connection, Ownership::Borrowed, hooks)
    }

    fn new(connection: DbConnection, ownership: Ownership, hooks: HookRegistry) -> Self {
        Self {
            connection,
            ownership,
            command: None,
            text: String::new(),
            parameters: Vec::new(),
            transaction: None,
            hooks,
        }
    }

    pub fn connection(&self) -> &DbConnection {
        &self.connection
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The bound driver command, if one exists.
    ///
    /// `None` before any SQL text is set and after an execution that did not
    /// keep its connection open.
    pub fn command(&self) -> Option<&DbCommand> {
        self.command.as_ref()
    }

    pub fn command_text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn set_command_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self.bind_command();
        self
    }

    /// Append text to the current command text.
    pub fn append_command_text(mut self, text: impl AsRef<str>) -> Self {
        self.text.push_str(text.as_ref());
        self.bind_command();
        self
    }

    pub fn add_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        db_type: DbType,
    ) -> Self {
        self.parameters.push(Parameter::new(name, value, db_type));
        self.rebind_command();
        self
    }

    /// Add a parameter whose absent or empty value binds as the driver null.
    pub fn add_nullable_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        db_type: DbType,
    ) -> Self {
        self.parameters.push(Parameter::nullable(name, value, db_type));
        self.rebind_command();
        self
    }

    /// Add several parameters, typing each from its value.
    pub fn add_parameters<I, N, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in parameters {
            let value = value.into();
            let db_type = DbType::infer(&value);
            self.parameters.push(Parameter::new(name, value, db_type));
        }
        self.rebind_command();
        self
    }

    pub fn clear_parameters(mut self) -> Self {
        self.parameters.clear();
        self.rebind_command();
        self
    }

    /// Attach a transaction; the next executions run inside it.
    pub fn set_transaction(mut self, transaction: &Transaction) -> Self {
        self.transaction = Some(transaction.clone());
        self.rebind_command();
        self
    }

    /// Create the driver command if needed and copy the current state into it.
    pub(crate) fn bind_command(&mut self) {
        let command = DbCommand {
            connection_id: self.connection.id(),
            text: self.text.clone(),
            parameters: self.parameters.clone(),
            transaction_id: self.transaction.as_ref().map(Transaction::id),
        };
        self.command = Some(command);
    }

    /// Refresh the driver command only if the text already created it.
    fn rebind_command(&mut self) {
        if self.command.is_some() {
            self.bind_command();
        }
    }

    /// Open the connection and make a trivial round trip.
    ///
    /// Returns false on any failure. A connection that was closed before the
    /// test is closed again afterwards.
    pub async fn test_connection(&mut self) -> bool {
        let was_open = self.connection.is_open().await;
        let result = async {
            self.connection.open().await?;
            self.connection.driver().await?.get()?.ping().await
        }
        .await;

        if !was_open {
            self.connection.close().await;
        }

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    connection = %self.connection.masked_connection_string(),
                    error = %e,
                    "Connection test failed"
                );
                false
            }
        }
    }

    /// Release the command: close an owned connection and clear the driver
    /// command. Safe to call repeatedly.
    pub async fn dispose(&mut self) {
        if self.ownership == Ownership::Owned {
            self.connection.close().await;
        }
        self.command = None;
    }

    /// Synchronous release used by drops and finished streams.
    pub(crate) fn release_now(&mut self, keep_connection_open: bool) {
        if keep_connection_open {
            return;
        }
        if self.ownership == Ownership::Owned {
            self.connection.close_now();
        }
        self.command = None;
    }

    /// Release after an execution.
    pub(crate) async fn release(&mut self, keep_connection_open: bool) {
        if keep_connection_open {
            return;
        }
        self.dispose().await;
    }
}

impl Drop for DatabaseCommand {
    fn drop(&mut self) {
        self.release_now(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteMemoryFactory;
    use std::sync::Arc;

    fn command() -> DatabaseCommand {
        let connection = DbConnection::new("sqlite-memory", "mem", Arc::new(SqliteMemoryFactory));
        DatabaseCommand::owned(connection, HookRegistry::new())
    }

    #[test]
    fn test_command_is_created_lazily() {
        let cmd = command();
        assert!(cmd.command().is_none());

        let cmd = cmd.set_command_text("SELECT 1");
        assert_eq!(cmd.command().unwrap().text, "SELECT 1");
    }

    #[tokio::test]
    async fn test_parameters_and_transaction_do_not_create_command() {
        let cmd = command();
        let transaction = cmd.connection().begin_transaction().await.unwrap();

        let cmd = cmd
            .add_parameter("@id", 1i32, DbType::Int32)
            .add_nullable_parameter("@name", "", DbType::String)
            .add_parameters([("@a", 1i64)])
            .set_transaction(&transaction)
            .clear_parameters()
            .add_parameter("@id", 2i32, DbType::Int32);
        assert!(cmd.command().is_none());

        let cmd = cmd.set_command_text("SELECT ?");
        let bound = cmd.command().unwrap();
        assert_eq!(bound.parameters.len(), 1);
        assert_eq!(bound.transaction_id, Some(transaction.id()));
    }

    #[test]
    fn test_parameters_flow_into_command() {
        let cmd = command()
            .set_command_text("SELECT ?")
            .add_parameter("@id", 1i32, DbType::Int32)
            .add_nullable_parameter("@name", "", DbType::String);

        let bound = cmd.command().unwrap();
        assert_eq!(bound.parameters.len(), 2);
        assert!(bound.parameters[1].is_null());
        assert_eq!(cmd.parameters()[0].value, Value::Int(1));
    }

    #[test]
    fn test_append_and_clear() {
        let cmd = command()
            .set_command_text("SELECT ")
            .append_command_text("1")
            .add_parameters([("@a", 1i64), ("@b", 2i64)])
            .clear_parameters();
        assert_eq!(cmd.command_text(), "SELECT 1");
        assert!(cmd.command().unwrap().parameters.is_empty());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let mut cmd = command().set_command_text("SELECT 1");
        cmd.dispose().await;
        cmd.dispose().await;
        assert!(cmd.command().is_none());
    }

    #[tokio::test]
    async fn test_connection_test() {
        let mut cmd = command();
        assert!(cmd.test_connection().await);
        assert!(!cmd.connection().is_open().await);

        let missing = DbConnection::new(
            "sqlite",
            "sqlite:/nonexistent-dir/none.db",
            Arc::new(crate::db::SqliteFactory),
        );
        let mut cmd = DatabaseCommand::owned(missing, HookRegistry::new());
        assert!(!cmd.test_connection().await);
    }
}
