//! Integration tests for nullable parameter binding.
//!
//! An absent or empty value must reach the database as NULL for every declared
//! type, never as an empty string.

use fluent_db::models::POSTGRES;
use fluent_db::{DatabaseCommand, DbContext, DbType, Value};

const TYPES: [DbType; 10] = [
    DbType::AnsiString,
    DbType::String,
    DbType::Boolean,
    DbType::Int16,
    DbType::Int32,
    DbType::Int64,
    DbType::Single,
    DbType::Double,
    DbType::Binary,
    DbType::Json,
];

/// In-memory database; the command keeps its connection open between calls.
async fn setup_memory() -> DatabaseCommand {
    let context = DbContext::new();
    let mut cmd = context
        .get_command_for_sqlite_memory(Some("nullable"))
        .await
        .unwrap()
        .set_command_text("CREATE TABLE Nullable (Id INTEGER PRIMARY KEY, Val)");
    cmd.execute_non_query(true).await.unwrap();
    cmd
}

#[tokio::test]
async fn test_empty_and_absent_values_bind_null_for_every_type() {
    let mut cmd = setup_memory().await;

    for (idx, db_type) in TYPES.into_iter().enumerate() {
        for value in [Value::from(""), Value::from(None::<i64>), Value::Null] {
            cmd = cmd
                .clear_parameters()
                .set_command_text("INSERT INTO Nullable (Val) VALUES (?)")
                .add_nullable_parameter("@val", value, db_type);
            assert!(cmd.parameters()[0].is_null(), "type #{idx} was not null");
            cmd.execute_non_query(true).await.unwrap();
        }
    }

    let mut cmd = cmd
        .clear_parameters()
        .set_command_text("SELECT COUNT(*) FROM Nullable WHERE Val IS NULL");
    let nulls: i64 = cmd.execute_scalar_as(true).await.unwrap();
    assert_eq!(nulls, (TYPES.len() * 3) as i64);

    let mut cmd = cmd.set_command_text("SELECT COUNT(*) FROM Nullable WHERE Val = ''");
    let empties: i64 = cmd.execute_scalar_as(false).await.unwrap();
    assert_eq!(empties, 0);
}

#[tokio::test]
async fn test_whitespace_and_values_are_kept() {
    let mut cmd = setup_memory()
        .await
        .set_command_text("INSERT INTO Nullable (Val) VALUES (?), (?)")
        .add_nullable_parameter("@blank", "  ", DbType::String)
        .add_nullable_parameter("@number", Some(7i32), DbType::Int32);
    cmd.execute_non_query(true).await.unwrap();

    let table = cmd
        .clear_parameters()
        .set_command_text("SELECT Val FROM Nullable ORDER BY Id")
        .execute_to_data_table(false)
        .await
        .unwrap();
    assert_eq!(table.rows[0].value(0), Some(&Value::Text("  ".to_string())));
    assert_eq!(table.rows[1].value(0), Some(&Value::Int(7)));
}

/// Typed nulls against PostgreSQL, where an untyped NULL of the wrong type is an error.
/// Set TEST_POSTGRES_URL environment variable to run this test.
#[tokio::test]
async fn test_postgres_typed_nulls() {
    let postgres_url = match std::env::var("TEST_POSTGRES_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: TEST_POSTGRES_URL not set");
            return;
        }
    };

    let context = DbContext::new();
    let mut cmd = context
        .get_command(Some(&postgres_url), Some(POSTGRES))
        .await
        .unwrap()
        .set_command_text(
            "SELECT $1::text IS NULL AND $2::int4 IS NULL AND $3::int8 IS NULL \
             AND $4::bool IS NULL AND $5::float8 IS NULL AND $6::bytea IS NULL",
        )
        .add_nullable_parameter("@text", "", DbType::String)
        .add_nullable_parameter("@int", None::<i32>, DbType::Int32)
        .add_nullable_parameter("@bigint", None::<i64>, DbType::Int64)
        .add_nullable_parameter("@flag", None::<bool>, DbType::Boolean)
        .add_nullable_parameter("@ratio", None::<f64>, DbType::Double)
        .add_nullable_parameter("@blob", None::<Vec<u8>>, DbType::Binary);

    let all_null: bool = cmd.execute_scalar_as(false).await.unwrap();
    assert!(all_null);
}

