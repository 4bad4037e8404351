//! Caller-constructed context.
//!
//! [`DbContext`] bundles the provider registry, named connections, default
//! settings and hooks that every command wrapper needs. Clones share all four.

use crate::command::DatabaseCommand;
use crate::db::{
    ConnectionResolver, ConnectionStrings, DbConnection, DefaultSettings, ProviderRegistry,
    ResolvedConnection,
};
use crate::error::Result;
use crate::hooks::HookRegistry;
use crate::models::{MYSQL, POSTGRES, SQL_SERVER, SQLITE, SQLITE_MEMORY};
use tracing::debug;

/// Entry point for creating connections and command wrappers.
#[derive(Debug, Clone, Default)]
pub struct DbContext {
    resolver: ConnectionResolver,
    hooks: HookRegistry,
}

impl DbContext {
    /// Context seeded with the built-in providers and nothing else.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parts(resolver: ConnectionResolver, hooks: HookRegistry) -> Self {
        Self { resolver, hooks }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.resolver.providers
    }

    pub fn connection_strings(&self) -> &ConnectionStrings {
        &self.resolver.connection_strings
    }

    pub fn defaults(&self) -> &DefaultSettings {
        &self.resolver.defaults
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn resolver(&self) -> &ConnectionResolver {
        &self.resolver
    }

    /// Resolve connection arguments without opening anything.
    pub fn resolve(
        &self,
        connection_string_or_name: Option<&str>,
        provider: Option<&str>,
    ) -> Result<ResolvedConnection> {
        self.resolver.resolve(connection_string_or_name, provider)
    }

    /// Resolve and open a connection.
    pub async fn create_connection(
        &self,
        connection_string_or_name: Option<&str>,
        provider: Option<&str>,
    ) -> Result<DbConnection> {
        self.resolver
            .create_connection(connection_string_or_name, provider)
            .await
    }

    /// Command wrapper over a freshly opened connection that it owns.
    ///
    /// Resolution errors surface here, before any hook runs.
    pub async fn get_command(
        &self,
        connection_string_or_name: Option<&str>,
        provider: Option<&str>,
    ) -> Result<DatabaseCommand> {
        let connection = self
            .create_connection(connection_string_or_name, provider)
            .await?;
        debug!(
            connection_id = %connection.id(),
            provider = %connection.provider(),
            "Created owned command"
        );
        Ok(DatabaseCommand::owned(connection, self.hooks.clone()))
    }

    pub async fn get_command_for_sql_server(
        &self,
        connection_string_or_name: Option<&str>,
    ) -> Result<DatabaseCommand> {
        self.get_command(connection_string_or_name, Some(SQL_SERVER))
            .await
    }

    pub async fn get_command_for_mysql(
        &self,
        connection_string_or_name: Option<&str>,
    ) -> Result<DatabaseCommand> {
        self.get_command(connection_string_or_name, Some(MYSQL)).await
    }

    pub async fn get_command_for_postgres(
        &self,
        connection_string_or_name: Option<&str>,
    ) -> Result<DatabaseCommand> {
        self.get_command(connection_string_or_name, Some(POSTGRES))
            .await
    }

    pub async fn get_command_for_sqlite(
        &self,
        connection_string_or_name: Option<&str>,
    ) -> Result<DatabaseCommand> {
        self.get_command(connection_string_or_name, Some(SQLITE)).await
    }

    /// The connection string only labels the private in-memory database.
    pub async fn get_command_for_sqlite_memory(
        &self,
        connection_string_or_name: Option<&str>,
    ) -> Result<DatabaseCommand> {
        self.get_command(connection_string_or_name, Some(SQLITE_MEMORY))
            .await
    }

    /// Command wrapper over a caller-supplied connection. The wrapper never
    /// closes it.
    pub fn get_command_for_connection(&self, connection: &DbConnection) -> DatabaseCommand {
        DatabaseCommand::borrowed(connection.clone(), self.hooks.clone())
    }
}
