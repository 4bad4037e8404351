//! Configuration handling for the fluent-db command line.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::context::DbContext;
use crate::error::{Error, Result};
use crate::models::{NamedConnection, Parameter, Value};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// What to do with the command and how to print its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// First column of the first row
    Scalar,
    /// Affected row count
    NonQuery,
    /// Rows of the first result set
    #[default]
    Query,
    /// Every result set
    DataSet,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::NonQuery => write!(f, "non-query"),
            Self::Query => write!(f, "query"),
            Self::DataSet => write!(f, "data-set"),
        }
    }
}

/// Configuration for the fluent-db binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fluent-db",
    about = "Run SQL through a provider-agnostic command layer and print the result as JSON",
    version,
    author
)]
pub struct Config {
    /// Named connections.
    /// Format: "name=connection_string". The provider is inferred from the scheme.
    /// Can be specified multiple times.
    #[arg(
        short = 'c',
        long = "connection",
        value_name = "NAME=URL",
        env = "FLUENT_DB_CONNECTION",
        value_delimiter = ','
    )]
    pub connections: Vec<String>,

    /// JSON file with named connections
    #[arg(long, value_name = "PATH", env = "FLUENT_DB_CONNECTIONS_FILE")]
    pub connections_file: Option<PathBuf>,

    /// Connection string or name used when none is given
    #[arg(long, env = "FLUENT_DB_DEFAULT_CONNECTION")]
    pub default_connection: Option<String>,

    /// Provider used when none is given or inferred
    #[arg(long, env = "FLUENT_DB_DEFAULT_PROVIDER")]
    pub default_provider: Option<String>,

    /// Connection string or name to run against
    #[arg(short = 'd', long, value_name = "URL_OR_NAME", env = "FLUENT_DB_DATABASE")]
    pub database: Option<String>,

    /// Provider identifier (sqlserver, mysql, postgres, sqlite, sqlite-memory)
    #[arg(short, long, env = "FLUENT_DB_PROVIDER")]
    pub provider: Option<String>,

    /// SQL to execute
    #[arg(short, long)]
    pub sql: String,

    /// Positional parameter as a JSON scalar, e.g. 42, "text", null.
    /// Can be specified multiple times.
    #[arg(long = "param", value_name = "JSON")]
    pub params: Vec<String>,

    /// Output mode
    #[arg(short, long, value_enum, default_value = "query")]
    pub mode: Mode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "FLUENT_DB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "FLUENT_DB_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            connections: Vec::new(),
            connections_file: None,
            default_connection: None,
            default_provider: None,
            database: None,
            provider: None,
            sql: String::new(),
            params: Vec::new(),
            mode: Mode::Query,
            log_level: "warn".to_string(),
            json_logs: false,
        }
    }

    /// Parse all `name=url` connection entries.
    pub fn parse_connections(&self) -> Result<Vec<NamedConnection>> {
        self.connections
            .iter()
            .map(|entry| {
                NamedConnection::parse_cli(entry).ok_or_else(|| {
                    Error::config(format!(
                        "invalid connection '{}': expected name=connection_string",
                        entry
                    ))
                })
            })
            .collect()
    }

    /// Parse the `--param` values into positional parameters `@p1`, `@p2`, ...
    pub fn parse_params(&self) -> Result<Vec<Parameter>> {
        self.params
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
                    Error::config(format!("invalid parameter {}: {}", idx + 1, e))
                })?;
                let value = Value::from(json);
                let db_type = crate::models::DbType::infer(&value);
                Ok(Parameter::new(format!("@p{}", idx + 1), value, db_type))
            })
            .collect()
    }

    /// Build a context with the configured named connections and defaults.
    pub fn build_context(&self) -> Result<DbContext> {
        let context = DbContext::new();

        if let Some(path) = &self.connections_file {
            context.connection_strings().load_json_file(path)?;
        }
        for entry in self.parse_connections()? {
            context.connection_strings().add(entry);
        }

        if let Some(value) = &self.default_connection {
            if context.connection_strings().contains(value) {
                context.defaults().set_connection_string_name(value.as_str());
            } else {
                context.defaults().set_connection_string(value.as_str());
            }
        }
        if let Some(provider) = &self.default_provider {
            context.defaults().set_provider(provider.as_str());
        }

        Ok(context)
    }

    /// Provider to pass explicitly: the flag, else one inferred from a raw
    /// connection string. Named connections carry their own provider.
    pub fn effective_provider(&self, context: &DbContext) -> Option<String> {
        if let Some(provider) = &self.provider {
            return Some(provider.clone());
        }
        let database = self.database.as_deref()?;
        if context.connection_strings().contains(database) {
            return None;
        }
        crate::models::provider_from_connection_string(database).map(String::from)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DbType, MYSQL, POSTGRES, SQLITE};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Query);
        assert_eq!(config.log_level, "warn");
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_parse_cli_args() {
        let config = Config::try_parse_from([
            "fluent-db",
            "--connection",
            "heroes=postgres://u:p@localhost/heroes",
            "--connection",
            "local=sqlite:local.db",
            "--sql",
            "SELECT 1",
            "--mode",
            "non-query",
        ])
        .unwrap();
        assert_eq!(config.mode, Mode::NonQuery);

        let named = config.parse_connections().unwrap();
        assert_eq!(named.len(), 2);
        assert_eq!(named[0].provider.as_deref(), Some(POSTGRES));
        assert_eq!(named[1].provider.as_deref(), Some(SQLITE));
    }

    #[test]
    fn test_invalid_connection_entry() {
        let config = Config {
            connections: vec!["no-equals-sign".to_string()],
            ..Config::default()
        };
        assert!(matches!(
            config.parse_connections(),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_parse_params() {
        let config = Config {
            params: vec!["42".into(), "\"Batman\"".into(), "null".into(), "true".into()],
            ..Config::default()
        };
        let params = config.parse_params().unwrap();
        assert_eq!(params[0].name, "@p1");
        assert_eq!(params[0].value, Value::Int(42));
        assert_eq!(params[1].db_type, DbType::String);
        assert!(params[2].is_null());
        assert_eq!(params[3].value, Value::Bool(true));

        let bad = Config {
            params: vec!["{oops".into()],
            ..Config::default()
        };
        assert!(bad.parse_params().is_err());
    }

    #[test]
    fn test_build_context_defaults() {
        let config = Config {
            connections: vec!["reports=mysql://r@db/reports".to_string()],
            default_connection: Some("reports".to_string()),
            default_provider: Some("SQLite".to_string()),
            ..Config::default()
        };
        let context = config.build_context().unwrap();
        assert_eq!(
            context.defaults().connection_string_name().as_deref(),
            Some("reports")
        );
        assert_eq!(context.defaults().connection_string(), None);
        assert_eq!(context.defaults().provider().as_deref(), Some(SQLITE));

        let resolved = context.resolve(None, None).unwrap();
        assert_eq!(resolved.provider, MYSQL);
    }

    #[test]
    fn test_effective_provider() {
        let context = DbContext::new();
        let config = Config {
            database: Some("postgres://u@localhost/db".to_string()),
            ..Config::default()
        };
        assert_eq!(config.effective_provider(&context).as_deref(), Some(POSTGRES));

        let explicit = Config {
            provider: Some("mysql".to_string()),
            ..config.clone()
        };
        assert_eq!(explicit.effective_provider(&context).as_deref(), Some(MYSQL));

        let opaque = Config {
            database: Some("scratch".to_string()),
            ..Config::default()
        };
        assert_eq!(opaque.effective_provider(&context), None);
    }
}
