//! Provider registry.
//!
//! Maps provider identifiers to the factories that open driver connections.
//! Identifiers are matched case-insensitively.

use crate::db::driver::ProviderFactory;
use crate::db::mysql::MySqlFactory;
use crate::db::postgres::PostgresFactory;
use crate::db::sqlite::{SqliteFactory, SqliteMemoryFactory};
use crate::db::sqlserver::SqlServerFactory;
use crate::error::{Error, Result};
use crate::models::normalize_provider;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Registry of provider factories, shared between clones.
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: Arc<RwLock<HashMap<String, Arc<dyn ProviderFactory>>>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin_providers()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.identifiers())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a registry seeded with the SQL Server, MySQL, PostgreSQL,
    /// SQLite and in-memory SQLite providers.
    pub fn with_builtin_providers() -> Self {
        let registry = Self::empty();
        registry.register_factory(Arc::new(SqlServerFactory));
        registry.register_factory(Arc::new(MySqlFactory));
        registry.register_factory(Arc::new(PostgresFactory));
        registry.register_factory(Arc::new(SqliteFactory));
        registry.register_factory(Arc::new(SqliteMemoryFactory));
        registry
    }

    /// Register a factory under an identifier, replacing any previous one.
    pub fn register(&self, identifier: &str, factory: Arc<dyn ProviderFactory>) {
        let key = normalize_provider(identifier);
        debug!(provider = %key, "Registering provider");
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, factory);
    }

    /// Register a factory under its own name.
    pub fn register_factory(&self, factory: Arc<dyn ProviderFactory>) {
        let name = factory.name();
        self.register(name, factory);
    }

    /// Look up the factory for an identifier.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn ProviderFactory>> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_provider(identifier))
            .cloned()
            .ok_or_else(|| Error::provider_not_found(Some(identifier)))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&normalize_provider(identifier))
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
