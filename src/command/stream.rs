//! Lazily projected reader results.
//!
//! [`RecordStream`] yields projected records one at a time and releases the
//! command once the logical execution is over: when the records run out, when
//! a projection fails, or when the stream is dropped part way through.

use crate::command::DatabaseCommand;
use crate::command::execute::DriverCall;
use crate::error::Result;
use crate::models::Record;
use tracing::debug;

/// Iterator over projected records of the first row-producing result set.
pub struct RecordStream<'a, T, F>
where
    F: FnMut(&Record) -> Result<T>,
{
    command: &'a mut DatabaseCommand,
    rows: std::vec::IntoIter<Record>,
    projection: F,
    keep_connection_open: bool,
    yielded: usize,
    finished: bool,
}

impl<T, F> RecordStream<'_, T, F>
where
    F: FnMut(&Record) -> Result<T>,
{
    /// Records not consumed yet.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        debug!(
            connection_id = %self.command.connection().id(),
            yielded = self.yielded,
            abandoned = self.rows.len(),
            "Reader finished"
        );
        self.command.release_now(self.keep_connection_open);
    }
}

impl<T, F> Iterator for RecordStream<'_, T, F>
where
    F: FnMut(&Record) -> Result<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some(record) = self.rows.next() else {
            self.finish();
            return None;
        };

        match (self.projection)(&record) {
            Ok(value) => {
                self.yielded += 1;
                Some(Ok(value))
            }
            Err(e) => {
                let e = self.command.notify_failure(e);
                self.finish();
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            (0, Some(self.rows.len()))
        }
    }
}

impl<T, F> Drop for RecordStream<'_, T, F>
where
    F: FnMut(&Record) -> Result<T>,
{
    fn drop(&mut self) {
        self.finish();
    }
}

impl DatabaseCommand {
    /// Execute and return a lazy iterator of projected records.
    ///
    /// Hooks run when the command executes, before the stream is returned.
    /// The command is released (per `keep_connection_open`) once the stream
    /// is exhausted, a projection fails, or the stream is dropped.
    pub async fn execute_reader_stream<T, F>(
        &mut self,
        keep_connection_open: bool,
        projection: F,
    ) -> Result<RecordStream<'_, T, F>>
    where
        F: FnMut(&Record) -> Result<T>,
    {
        let output = match self.dispatch(DriverCall::Query).await {
            Ok(output) => output,
            Err(e) => {
                self.release(keep_connection_open).await;
                return Err(e);
            }
        };

        let table = output.into_first_table();
        Ok(RecordStream {
            command: self,
            rows: table.rows.into_iter(),
            projection,
            keep_connection_open,
            yielded: 0,
            finished: false,
        })
    }
}
