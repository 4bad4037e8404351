//! Driver abstraction.
//!
//! Every backend exposes one open connection through [`DriverConnection`]
//! and is created by a [`ProviderFactory`] registered under its identifier.

use crate::error::Result;
use crate::models::{DataTable, Parameter, Record, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A single open driver connection.
#[async_trait]
pub trait DriverConnection: Send {
    /// Provider identifier this connection was created by.
    fn provider(&self) -> &'static str;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64>;

    /// Run a statement and collect its row-producing result sets.
    ///
    /// Always returns at least one table. A row-producing statement that
    /// returned no rows keeps its columns; a command that produced no result
    /// set at all yields a single empty table without columns.
    async fn query(&mut self, sql: &str, params: &[Parameter]) -> Result<Vec<DataTable>>;

    /// Trivial round trip to check the connection is alive.
    async fn ping(&mut self) -> Result<()>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Gracefully close the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Creates driver connections for one provider identifier.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Canonical provider identifier (lowercase).
    fn name(&self) -> &'static str;

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverConnection>>;
}

/// Accumulates rows into tables while a multi-statement result is read.
#[derive(Debug, Default)]
pub(crate) struct ResultSetBuilder {
    tables: Vec<DataTable>,
    columns: Option<Arc<[String]>>,
    rows: Vec<Record>,
    /// Columns came from metadata, keep the set even without rows.
    described: bool,
}

impl ResultSetBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a row to the current result set. Column names are taken from the
    /// first row only.
    pub(crate) fn push_row<F>(&mut self, column_names: F, values: Vec<Value>)
    where
        F: FnOnce() -> Vec<String>,
    {
        let columns = self
            .columns
            .get_or_insert_with(|| column_names().into())
            .clone();
        self.rows.push(Record::new(columns, values));
    }

    /// Start a result set whose columns are known before its rows.
    pub(crate) fn start_result_set(&mut self, columns: Vec<String>) {
        self.end_result_set();
        self.columns = Some(columns.into());
        self.described = true;
    }

    /// True until a row or a described result set has been seen.
    pub(crate) fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.rows.is_empty() && self.columns.is_none()
    }

    /// Close the current result set. Sets with neither rows nor described
    /// columns are dropped.
    pub(crate) fn end_result_set(&mut self) {
        let columns = self.columns.take();
        let described = std::mem::take(&mut self.described);
        if self.rows.is_empty() && !described {
            return;
        }
        let rows = std::mem::take(&mut self.rows);
        let columns = columns.map(|c| c.to_vec()).unwrap_or_default();
        self.tables.push(DataTable::new(columns, rows));
    }

    pub(crate) fn finish(mut self) -> Vec<DataTable> {
        self.end_result_set();
        if self.tables.is_empty() {
            self.tables.push(DataTable::default());
        }
        self.tables
    }
}

/// Split SQL text into its statements.
///
/// Semicolons inside quotes, bracketed identifiers, comments and
/// PostgreSQL dollar-quoted bodies do not split. Empty statements are
/// skipped.
pub(crate) fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_past(bytes, i + 1, &[quote]);
            }
            b'[' => i = skip_past(bytes, i + 1, b"]"),
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_past(bytes, i + 2, b"\n"),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_past(bytes, i + 2, b"*/"),
            b'$' => match dollar_tag(bytes, i) {
                Some(tag) => i = skip_past(bytes, i + tag.len(), tag),
                None => i += 1,
            },
            b';' => {
                push_statement(&mut statements, &sql[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    push_statement(&mut statements, &sql[start..]);
    statements
}

fn push_statement<'a>(statements: &mut Vec<&'a str>, statement: &'a str) {
    let statement = statement.trim();
    if !statement.is_empty() {
        statements.push(statement);
    }
}

/// Index just past the next occurrence of `end` at or after `from`.
fn skip_past(bytes: &[u8], from: usize, end: &[u8]) -> usize {
    bytes[from.min(bytes.len())..]
        .windows(end.len())
        .position(|window| window == end)
        .map(|pos| from + pos + end.len())
        .unwrap_or(bytes.len())
}

/// `$tag$` opening at `at`, if any. Positional `$1` placeholders are not tags.
fn dollar_tag(bytes: &[u8], at: usize) -> Option<&[u8]> {
    let rest = &bytes[at + 1..];
    let len = rest
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))?;
    if rest[len] != b'$' || rest.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    Some(&bytes[at..at + len + 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["id".to_string()]
    }

    #[test]
    fn test_builder_splits_result_sets() {
        let mut builder = ResultSetBuilder::new();
        builder.push_row(names, vec![Value::Int(1)]);
        builder.push_row(names, vec![Value::Int(2)]);
        builder.end_result_set();
        // a statement with no rows, e.g. an UPDATE
        builder.end_result_set();
        builder.push_row(names, vec![Value::Int(3)]);

        let tables = builder.finish();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].row_count(), 2);
        assert_eq!(tables[0].columns, names());
        assert_eq!(tables[1].scalar(), Value::Int(3));
    }

    #[test]
    fn test_builder_keeps_described_sets_without_rows() {
        let mut builder = ResultSetBuilder::new();
        assert!(builder.is_empty());
        builder.start_result_set(vec!["a".to_string(), "b".to_string()]);
        assert!(!builder.is_empty());
        builder.start_result_set(names());
        builder.push_row(names, vec![Value::Int(1)]);

        let tables = builder.finish();
        assert_eq!(tables.len(), 2);
        assert!(tables[0].is_empty());
        assert_eq!(tables[0].columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(tables[1].scalar(), Value::Int(1));
    }

    #[test]
    fn test_split_statements() {
        assert_eq!(
            split_statements("CREATE TABLE x (a INTEGER); SELECT a FROM x;"),
            vec!["CREATE TABLE x (a INTEGER)", "SELECT a FROM x"]
        );
        assert_eq!(
            split_statements("SELECT ';' AS [a;b], \"c;d\" -- x;y\n FROM t /* ; */"),
            vec!["SELECT ';' AS [a;b], \"c;d\" -- x;y\n FROM t /* ; */"]
        );
        assert_eq!(
            split_statements("DO $body$ BEGIN PERFORM 1; END $body$; SELECT $1"),
            vec!["DO $body$ BEGIN PERFORM 1; END $body$", "SELECT $1"]
        );
        assert!(split_statements(" ; ").is_empty());
    }

    #[test]
    fn test_builder_without_rows_yields_one_empty_table() {
        let mut builder = ResultSetBuilder::new();
        builder.end_result_set();
        let tables = builder.finish();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].is_empty());
    }
}
