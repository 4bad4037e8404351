//! Error types for fluent-db.
//!
//! Only resolution-phase failures (no connection string, no provider) and a few
//! library-level conditions get their own variants. Driver failures are carried
//! through unchanged in the transparent variants so callers can match on the
//! exact error the driver reported.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "No connection string could be resolved{}. Pass one explicitly, use a configured connection name, or set a default.",
        .name.as_deref().map(|n| format!(" for '{n}'")).unwrap_or_default()
    )]
    ConnectionStringNotFound { name: Option<String> },

    #[error(
        "No database provider could be resolved{}. Pass a registered provider identifier or set a default provider.",
        .provider.as_deref().map(|p| format!(" for '{p}'")).unwrap_or_default()
    )]
    ProviderNotFound { provider: Option<String> },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Result mapping failed: {message}")]
    Mapping { message: String },

    #[error("Transaction {transaction_id} belongs to a different connection")]
    TransactionMismatch { transaction_id: String },

    #[error("Transaction {transaction_id} is no longer active")]
    TransactionNotActive { transaction_id: String },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    SqlServer(#[from] tiberius::error::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a connection-string-not-found error.
    pub fn connection_string_not_found(name: Option<&str>) -> Self {
        Self::ConnectionStringNotFound {
            name: name.map(String::from),
        }
    }

    /// Create a provider-not-found error.
    pub fn provider_not_found(provider: Option<&str>) -> Self {
        Self::ProviderNotFound {
            provider: provider.map(String::from),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a result mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    pub fn transaction_mismatch(transaction_id: impl Into<String>) -> Self {
        Self::TransactionMismatch {
            transaction_id: transaction_id.into(),
        }
    }

    pub fn transaction_not_active(transaction_id: impl Into<String>) -> Self {
        Self::TransactionNotActive {
            transaction_id: transaction_id.into(),
        }
    }

    /// True for failures raised while resolving a connection, before anything ran.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionStringNotFound { .. } | Self::ProviderNotFound { .. }
        )
    }

    /// True when the error came straight from a database driver.
    pub fn is_driver_error(&self) -> bool {
        matches!(self, Self::Sqlx(_) | Self::SqlServer(_) | Self::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::mapping(err.to_string())
    }
}

/// Result type alias for fluent-db operations.
pub type Result<T> = std::result::Result<T, Error>;
