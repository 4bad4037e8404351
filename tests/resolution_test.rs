//! Integration tests for connection resolution.
//!
//! Tests verify that:
//! - Named connections supply both the connection string and the provider
//! - Missing connection strings are reported before missing providers
//! - Defaults fill in whatever the call leaves out
//! - Environment variables can back named connections

use fluent_db::db::SqliteMemoryFactory;
use fluent_db::models::{MYSQL, NamedConnection, SQLITE, SQLITE_MEMORY};
use fluent_db::{DbContext, Error};
use std::sync::Arc;

fn context_with_names() -> DbContext {
    let context = DbContext::new();
    context
        .connection_strings()
        .add(NamedConnection::new("SuperHeroes", "heroes", Some(SQLITE_MEMORY)));
    context
        .connection_strings()
        .add(NamedConnection::new("Reports", "mysql://r:secret@db/reports", Some(MYSQL)));
    context
}

#[tokio::test]
async fn test_named_connection_opens_with_its_provider() {
    let context = context_with_names();

    let connection = context.create_connection(Some("SuperHeroes"), None).await.unwrap();
    assert!(connection.is_open().await);
    assert_eq!(connection.provider(), SQLITE_MEMORY);
    assert_eq!(connection.connection_string(), "heroes");

    connection.close().await;
    assert!(!connection.is_open().await);
}

#[tokio::test]
async fn test_missing_connection_string_for_any_provider() {
    let context = context_with_names();

    for provider in [Some(SQLITE), Some(MYSQL), Some("unknown"), None] {
        let err = context.create_connection(None, provider).await.unwrap_err();
        assert!(
            matches!(err, Error::ConnectionStringNotFound { .. }),
            "provider {provider:?} gave {err}"
        );
        assert!(err.is_resolution_error());
    }
}

#[tokio::test]
async fn test_missing_provider_for_raw_string() {
    let context = context_with_names();

    let err = context
        .create_connection(Some("sqlite:heroes.db"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderNotFound { provider: None }));

    let err = context
        .create_connection(Some("sqlite:heroes.db"), Some("oracle"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderNotFound { provider: Some(ref p) } if p == "oracle"));
}

#[tokio::test]
async fn test_defaults_fill_in_missing_arguments() {
    let context = context_with_names();
    context.defaults().set_connection_string_name("SuperHeroes");

    let connection = context.create_connection(None, None).await.unwrap();
    assert_eq!(connection.provider(), SQLITE_MEMORY);

    context.defaults().clear();
    context.defaults().set_provider(SQLITE_MEMORY);
    let connection = context
        .create_connection(Some("anything"), None)
        .await
        .unwrap();
    assert_eq!(connection.connection_string(), "anything");
}

#[test]
fn test_explicit_provider_beats_named_and_default() {
    let context = context_with_names();
    context.defaults().set_provider(SQLITE);

    let resolved = context.resolve(Some("Reports"), None).unwrap();
    assert_eq!(resolved.provider, MYSQL);
    assert_eq!(resolved.connection_name.as_deref(), Some("Reports"));

    let resolved = context.resolve(Some("Reports"), Some(SQLITE_MEMORY)).unwrap();
    assert_eq!(resolved.provider, SQLITE_MEMORY);

    // credentials never show up in debug output
    let debug = format!("{:?}", context.resolve(Some("Reports"), None).unwrap());
    assert!(!debug.contains("secret"));
}

#[tokio::test]
async fn test_registered_provider_alias() {
    let context = DbContext::new();
    context
        .providers()
        .register("embedded", Arc::new(SqliteMemoryFactory));

    let connection = context
        .create_connection(Some("scratch"), Some("EMBEDDED"))
        .await
        .unwrap();
    assert!(connection.is_open().await);
    assert_eq!(connection.provider(), SQLITE_MEMORY);
}

#[tokio::test]
async fn test_named_connection_from_environment() {
    let name = "FLUENT_DB_TEST_ENV_CONNECTION";
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var(name, "env-backed") };

    let context = DbContext::new();
    context
        .connection_strings()
        .add_from_environment(name, SQLITE_MEMORY)
        .unwrap();
    // second call is a no-op
    context
        .connection_strings()
        .add_from_environment(name, SQLITE_MEMORY)
        .unwrap();

    let connection = context.create_connection(Some(name), None).await.unwrap();
    assert_eq!(connection.connection_string(), "env-backed");
    assert_eq!(connection.provider(), SQLITE_MEMORY);

    let err = context
        .connection_strings()
        .add_from_environment("FLUENT_DB_TEST_ENV_MISSING", SQLITE)
        .unwrap_err();
    assert!(matches!(err, Error::Config { ref message } if message.contains("FLUENT_DB_TEST_ENV_MISSING")));
}

#[tokio::test]
async fn test_named_connections_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("connections.json");
    std::fs::write(
        &path,
        r#"{"connection_strings": [
            {"name": "Scratch", "connection_string": "scratch", "provider": "SQLite-Memory"}
        ]}"#,
    )
    .unwrap();

    let context = DbContext::new();
    context.connection_strings().load_json_file(&path).unwrap();

    let mut cmd = context
        .get_command(Some("scratch"), None)
        .await
        .unwrap()
        .set_command_text("SELECT 40 + 2");
    let answer: i64 = cmd.execute_scalar_as(false).await.unwrap();
    assert_eq!(answer, 42);
}
