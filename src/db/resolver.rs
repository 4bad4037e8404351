//! Connection resolution.
//!
//! Turns a connection string or connection name plus an optional provider
//! identifier into a connection, falling back on [`DefaultSettings`]:
//!
//! 1. an absent or empty value takes the default connection string, then the
//!    default connection name, else `ConnectionStringNotFound`
//! 2. a value matching a named connection is replaced by its connection
//!    string; its provider is adopted when none was passed
//! 3. an absent provider takes the default provider, else `ProviderNotFound`
//! 4. the provider is looked up in the registry (`ProviderNotFound` if unknown)
//!
//! The order matters: callers distinguish which error fires when only one of
//! the two inputs is missing.

use crate::db::connection::DbConnection;
use crate::db::driver::ProviderFactory;
use crate::db::provider::ProviderRegistry;
use crate::error::{Error, Result};
use crate::models::{NamedConnection, masked_connection_string, normalize_provider};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Named connections
// =============================================================================

#[derive(Debug, Deserialize)]
struct ConnectionStringsFile {
    #[serde(default)]
    connection_strings: Vec<NamedConnection>,
}

/// Named connection entries. Names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStrings {
    entries: Arc<RwLock<HashMap<String, NamedConnection>>>,
}

impl ConnectionStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load entries from a JSON file of the form
    /// `{"connection_strings": [{"name": ..., "connection_string": ..., "provider": ...}]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let named = Self::new();
        named.load_json_file(path)?;
        Ok(named)
    }

    pub fn load_json_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let count = self.load_json_str(&content).map_err(|e| {
            Error::config(format!(
                "invalid connection strings file {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), count, "Loaded named connections");
        Ok(count)
    }

    pub fn load_json_str(&self, content: &str) -> Result<usize> {
        let file: ConnectionStringsFile =
            serde_json::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        let count = file.connection_strings.len();
        for entry in file.connection_strings {
            self.add(entry);
        }
        Ok(count)
    }

    /// Add or replace an entry.
    pub fn add(&self, entry: NamedConnection) {
        let entry = NamedConnection {
            provider: entry.provider.as_deref().map(normalize_provider),
            ..entry
        };
        debug!(
            name = %entry.name,
            provider = ?entry.provider,
            connection = %entry.masked_connection_string(),
            "Adding named connection"
        );
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.name.to_lowercase(), entry);
    }

    pub fn get(&self, name: &str) -> Option<NamedConnection> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| e.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make sure an entry named `name` exists, creating it from the process
    /// environment variable of the same name if needed.
    ///
    /// Safe to call repeatedly. Fails when neither an entry nor the variable
    /// exists.
    pub fn add_from_environment(&self, name: &str, provider: &str) -> Result<()> {
        if self.contains(name) {
            return Ok(());
        }

        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => {
                self.add(NamedConnection::new(name, value, Some(provider)));
                Ok(())
            }
            _ => Err(Error::config(format!(
                "no connection string named '{}' is configured and environment variable '{}' is not set",
                name, name
            ))),
        }
    }
}

// =============================================================================
// Default settings
// =============================================================================

/// Snapshot of the default settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultValues {
    pub connection_string: Option<String>,
    pub connection_string_name: Option<String>,
    pub provider: Option<String>,
}

/// Defaults consulted when a call omits its connection or provider.
///
/// The three fields are independent; clearing one never touches the others.
#[derive(Debug, Clone, Default)]
pub struct DefaultSettings {
    values: Arc<RwLock<DefaultValues>>,
}

impl DefaultSettings {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut DefaultValues)) {
        f(&mut self.values.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn snapshot(&self) -> DefaultValues {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn connection_string(&self) -> Option<String> {
        self.snapshot().connection_string
    }

    pub fn connection_string_name(&self) -> Option<String> {
        self.snapshot().connection_string_name
    }

    pub fn provider(&self) -> Option<String> {
        self.snapshot().provider
    }

    pub fn set_connection_string(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|v| v.connection_string = Some(value));
    }

    pub fn set_connection_string_name(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|v| v.connection_string_name = Some(value));
    }

    pub fn set_provider(&self, value: impl Into<String>) {
        let value = normalize_provider(&value.into());
        self.update(|v| v.provider = Some(value));
    }

    pub fn clear_connection_string(&self) {
        self.update(|v| v.connection_string = None);
    }

    pub fn clear_connection_string_name(&self) {
        self.update(|v| v.connection_string_name = None);
    }

    pub fn clear_provider(&self) {
        self.update(|v| v.provider = None);
    }

    /// Reset all three defaults.
    pub fn clear(&self) {
        self.update(|v| *v = DefaultValues::default());
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Outcome of a successful resolution.
#[derive(Clone)]
pub struct ResolvedConnection {
    /// Contains sensitive data - never log
    pub connection_string: String,
    pub provider: String,
    /// Name of the named connection used, if any.
    pub connection_name: Option<String>,
    pub factory: Arc<dyn ProviderFactory>,
}

impl std::fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("connection_string", &masked_connection_string(&self.connection_string))
            .field("provider", &self.provider)
            .field("connection_name", &self.connection_name)
            .finish()
    }
}

impl ResolvedConnection {
    /// Build a closed connection handle from the resolution.
    pub fn into_connection(self) -> DbConnection {
        DbConnection::new(self.provider, self.connection_string, self.factory)
    }
}

/// Resolves connection arguments against named connections, defaults and
/// the provider registry.
#[derive(Debug, Clone, Default)]
pub struct ConnectionResolver {
    pub providers: ProviderRegistry,
    pub connection_strings: ConnectionStrings,
    pub defaults: DefaultSettings,
}

impl ConnectionResolver {
    pub fn new(
        providers: ProviderRegistry,
        connection_strings: ConnectionStrings,
        defaults: DefaultSettings,
    ) -> Self {
        Self {
            providers,
            connection_strings,
            defaults,
        }
    }

    /// Resolve without opening anything.
    pub fn resolve(
        &self,
        connection_string_or_name: Option<&str>,
        provider: Option<&str>,
    ) -> Result<ResolvedConnection> {
        let defaults = self.defaults.snapshot();

        let value = non_empty(connection_string_or_name)
            .map(String::from)
            .or_else(|| non_empty(defaults.connection_string.as_deref()).map(String::from))
            .or_else(|| non_empty(defaults.connection_string_name.as_deref()).map(String::from))
            .ok_or_else(|| Error::connection_string_not_found(None))?;

        let mut provider = non_empty(provider).map(String::from);
        let (connection_string, connection_name) = match self.connection_strings.get(&value) {
            Some(entry) => {
                if entry.connection_string.trim().is_empty() {
                    return Err(Error::connection_string_not_found(Some(&entry.name)));
                }
                if provider.is_none() {
                    provider = entry.provider.clone();
                }
                (entry.connection_string, Some(entry.name))
            }
            None => (value, None),
        };

        let provider = provider
            .or_else(|| non_empty(defaults.provider.as_deref()).map(String::from))
            .ok_or_else(|| Error::provider_not_found(None))?;
        let factory = self.providers.resolve(&provider)?;

        debug!(
            provider = %factory.name(),
            connection_name = ?connection_name,
            connection = %masked_connection_string(&connection_string),
            "Resolved connection"
        );

        Ok(ResolvedConnection {
            connection_string,
            provider: factory.name().to_string(),
            connection_name,
            factory,
        })
    }

    /// Resolve and open a connection. Driver errors while opening propagate
    /// unchanged.
    pub async fn create_connection(
        &self,
        connection_string_or_name: Option<&str>,
        provider: Option<&str>,
    ) -> Result<DbConnection> {
        let connection = self
            .resolve(connection_string_or_name, provider)?
            .into_connection();
        connection.open().await?;
        Ok(connection)
    }
}
