//! Connection-related data models.
//!
//! Provider identifiers, named connection entries and transaction state.

use serde::{Deserialize, Serialize};

/// Provider identifier for Microsoft SQL Server.
pub const SQL_SERVER: &str = "sqlserver";
/// Provider identifier for MySQL and MariaDB.
pub const MYSQL: &str = "mysql";
/// Provider identifier for PostgreSQL.
pub const POSTGRES: &str = "postgres";
/// Provider identifier for file-backed SQLite.
pub const SQLITE: &str = "sqlite";
/// Provider identifier for a private in-memory SQLite database.
pub const SQLITE_MEMORY: &str = "sqlite-memory";

/// Every provider identifier seeded into a new registry.
pub const BUILTIN_PROVIDERS: [&str; 5] = [SQL_SERVER, MYSQL, POSTGRES, SQLITE, SQLITE_MEMORY];

/// Normalize a provider identifier for lookup.
pub fn normalize_provider(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Guess a provider from the scheme of a connection URL.
///
/// Used only when loading named connections from the command line; the
/// resolver itself never sniffs connection strings.
pub fn provider_from_connection_string(connection_string: &str) -> Option<&'static str> {
    let lower = connection_string.trim().to_lowercase();
    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        Some(POSTGRES)
    } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
        Some(MYSQL)
    } else if lower == "sqlite::memory:" || lower.starts_with("sqlite::memory:?") {
        Some(SQLITE_MEMORY)
    } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
        Some(SQLITE)
    } else if lower.starts_with("sqlserver://") || lower.starts_with("mssql://") {
        Some(SQL_SERVER)
    } else if lower.contains("server=") || lower.contains("data source=") {
        Some(SQL_SERVER)
    } else {
        None
    }
}

/// Get a display-safe version of a connection string (credentials masked).
///
/// Handles both URL credentials (`user:secret@host`) and key/value
/// `Password=secret;` segments.
pub fn masked_connection_string(connection_string: &str) -> String {
    if let Some(scheme_end) = connection_string.find("://").map(|p| p + 3) {
        let at_pos = connection_string[scheme_end..]
            .find('@')
            .map(|p| scheme_end + p);
        if let Some(at_pos) = at_pos {
            if let Some(colon_pos) = connection_string[scheme_end..at_pos].rfind(':') {
                let colon_pos = scheme_end + colon_pos;
                let prefix = &connection_string[..colon_pos + 1];
                let suffix = &connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
    }

    if connection_string.contains('=') {
        return connection_string
            .split(';')
            .map(|segment| match segment.split_once('=') {
                Some((key, _)) if is_secret_key(key) => format!("{}=****", key),
                _ => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join(";");
    }

    connection_string.to_string()
}

fn is_secret_key(key: &str) -> bool {
    matches!(
        key.trim().to_lowercase().as_str(),
        "password" | "pwd" | "pass"
    )
}

/// A logical name mapped to a connection string and provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedConnection {
    pub name: String,
    /// Contains sensitive data - never log
    pub connection_string: String,
    #[serde(default)]
    pub provider: Option<String>,
}

impl NamedConnection {
    pub fn new(
        name: impl Into<String>,
        connection_string: impl Into<String>,
        provider: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            connection_string: connection_string.into(),
            provider: provider.map(normalize_provider),
        }
    }

    /// Parse a `name=connection_string` command line entry, inferring the
    /// provider from the URL scheme.
    pub fn parse_cli(entry: &str) -> Option<Self> {
        let (name, connection_string) = entry.split_once('=')?;
        let name = name.trim();
        let connection_string = connection_string.trim();
        if name.is_empty() || connection_string.is_empty() {
            return None;
        }
        Some(Self::new(
            name,
            connection_string,
            provider_from_connection_string(connection_string),
        ))
    }

    pub fn masked_connection_string(&self) -> String {
        masked_connection_string(&self.connection_string)
    }
}

/// Transaction state for a transaction begun on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    /// Check if the transaction is still active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the transaction has ended (committed or rolled back).
    pub fn is_ended(&self) -> bool {
        !self.is_active()
    }
}
