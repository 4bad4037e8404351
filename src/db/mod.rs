//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver and provider factory traits
//! - Provider registry seeded with the built-in backends
//! - Connection resolution from strings, names and defaults
//! - Connection handles and transactions
//! - Parameter binding and column decoding

#[macro_use]
pub mod macros;
pub mod connection;
pub mod driver;
pub mod mysql;
pub mod params;
pub mod postgres;
pub mod provider;
pub mod resolver;
pub mod sqlite;
pub mod sqlserver;
pub mod types;

pub use connection::{DbConnection, Transaction};
pub use driver::{DriverConnection, ProviderFactory};
pub use mysql::MySqlFactory;
pub use postgres::PostgresFactory;
pub use provider::ProviderRegistry;
pub use resolver::{
    ConnectionResolver, ConnectionStrings, DefaultSettings, DefaultValues, ResolvedConnection,
};
pub use sqlite::{SqliteFactory, SqliteMemoryFactory};
pub use sqlserver::SqlServerFactory;
