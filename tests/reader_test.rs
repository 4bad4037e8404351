//! Integration tests for reader-style operations.
//!
//! Tests verify that:
//! - Rows written are read back once each, in result order
//! - Object mapping works by column name
//! - Lazy readers release the command when exhausted, abandoned or failed

use fluent_db::models::SQLITE;
use fluent_db::{DbContext, DbType, Error, Record, Value};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const ROWS: i64 = 25;

async fn setup_db() -> (DbContext, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("reader.db").display());

    let context = DbContext::new();
    context.defaults().set_connection_string(url);
    context.defaults().set_provider(SQLITE);

    let mut cmd = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("CREATE TABLE Item (Id INTEGER PRIMARY KEY, Label TEXT, Price REAL)");
    cmd.execute_non_query(false).await.unwrap();

    for i in 1..=ROWS {
        let affected = context
            .get_command(None, None)
            .await
            .unwrap()
            .set_command_text("INSERT INTO Item (Id, Label, Price) VALUES (?, ?, ?)")
            .add_parameter("@id", i, DbType::Int64)
            .add_parameter("@label", format!("item-{i}"), DbType::String)
            .add_parameter("@price", i as f64 * 1.5, DbType::Double)
            .execute_non_query(false)
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }

    (context, dir)
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct Item {
    id: i64,
    label: String,
    price: f64,
}

#[tokio::test]
async fn test_reader_callback_sees_every_row_in_order() {
    let (context, _dir) = setup_db().await;

    let mut ids = Vec::new();
    context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id, Label FROM Item ORDER BY Id")
        .execute_reader(false, |record| {
            ids.push(record.get::<i64>(0).unwrap());
        })
        .await
        .unwrap();

    assert_eq!(ids, (1..=ROWS).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_to_list_and_to_object() {
    let (context, _dir) = setup_db().await;

    let items: Vec<Item> = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id, Label, Price FROM Item WHERE Id <= 3 ORDER BY Id")
        .execute_to_list(false)
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(
        items[2],
        Item {
            id: 3,
            label: "item-3".to_string(),
            price: 4.5
        }
    );

    let missing: Option<Item> = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id, Label, Price FROM Item WHERE Id = ?")
        .add_parameter("@id", 9999i64, DbType::Int64)
        .execute_to_object(false)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_to_dynamic_and_to_map() {
    let (context, _dir) = setup_db().await;

    let rows = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id, Label FROM Item WHERE Id = 7")
        .execute_to_dynamic(false)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Label"], serde_json::json!("item-7"));

    let labels = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Label FROM Item WHERE Id IN (1, 2) ORDER BY Id")
        .execute_to_map(false, |r: &Record| r.get_by_name::<String>("label"))
        .await
        .unwrap();
    assert_eq!(labels, vec!["item-1".to_string(), "item-2".to_string()]);
}

#[tokio::test]
async fn test_empty_result_shapes() {
    let (context, _dir) = setup_db().await;

    let scalar = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id FROM Item WHERE Id < 0")
        .execute_scalar(false)
        .await
        .unwrap();
    assert_eq!(scalar, Value::Null);

    let table = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id FROM Item WHERE Id < 0")
        .execute_to_data_table(false)
        .await
        .unwrap();
    assert!(table.is_empty());
    assert_eq!(table.columns, vec!["Id".to_string()]);

    // the table is created by the same batch that selects from it
    let table = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("CREATE TABLE Fresh (a INTEGER, b TEXT); SELECT a, b FROM Fresh;")
        .execute_to_data_table(false)
        .await
        .unwrap();
    assert!(table.is_empty());
    assert_eq!(table.columns, vec!["a".to_string(), "b".to_string()]);

    let set = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id, Label FROM Item WHERE Id < ?")
        .add_parameter("@id", 0i64, DbType::Int64)
        .execute_to_data_set(false)
        .await
        .unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.tables[0].columns, vec!["Id".to_string(), "Label".to_string()]);

    // statements without a result set still give one table without columns
    let table = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("UPDATE Item SET Id = Id WHERE Id < 0")
        .execute_to_data_table(false)
        .await
        .unwrap();
    assert!(table.is_empty());
    assert!(table.columns.is_empty());
}

#[tokio::test]
async fn test_stream_released_when_exhausted() {
    let (context, _dir) = setup_db().await;

    let mut cmd = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id FROM Item ORDER BY Id");
    let connection = cmd.connection().clone();

    let mut stream = cmd
        .execute_reader_stream(false, |r| r.get::<i64>(0))
        .await
        .unwrap();
    assert_eq!(stream.remaining(), ROWS as usize);

    let mut count = 0;
    for id in stream.by_ref() {
        id.unwrap();
        count += 1;
    }
    assert_eq!(count, ROWS);
    assert!(stream.is_finished());
    drop(stream);

    assert!(!connection.is_open().await);
    assert!(cmd.command().is_none());
}

#[tokio::test]
async fn test_stream_released_when_abandoned() {
    let (context, _dir) = setup_db().await;

    let mut cmd = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id FROM Item ORDER BY Id");
    let connection = cmd.connection().clone();

    let first_two: Vec<i64> = cmd
        .execute_reader_stream(false, |r| r.get::<i64>(0))
        .await
        .unwrap()
        .take(2)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(first_two, vec![1, 2]);

    assert!(!connection.is_open().await);
    assert!(cmd.command().is_none());
}

#[tokio::test]
async fn test_stream_keeps_connection_open_when_asked() {
    let (context, _dir) = setup_db().await;

    let mut cmd = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id FROM Item ORDER BY Id");

    let stream = cmd
        .execute_reader_stream(true, |r| r.get::<i64>(0))
        .await
        .unwrap();
    drop(stream);

    assert!(cmd.connection().is_open().await);
    assert!(cmd.command().is_some());
}

#[tokio::test]
async fn test_stream_projection_error_ends_stream() {
    let (context, _dir) = setup_db().await;

    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();
    context.hooks().add_unhandled_exception(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut cmd = context
        .get_command(None, None)
        .await
        .unwrap()
        .set_command_text("SELECT Id FROM Item ORDER BY Id");
    let connection = cmd.connection().clone();

    let mut stream = cmd
        .execute_reader_stream(false, |r| {
            let id: i64 = r.get(0)?;
            if id == 3 {
                return Err(Error::mapping("unexpected id"));
            }
            Ok(id)
        })
        .await
        .unwrap();

    assert_eq!(stream.next().unwrap().unwrap(), 1);
    assert_eq!(stream.next().unwrap().unwrap(), 2);
    assert!(matches!(stream.next(), Some(Err(Error::Mapping { .. }))));
    assert!(stream.next().is_none());
    drop(stream);

    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert!(!connection.is_open().await);
}
