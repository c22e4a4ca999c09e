//! Messages exchanged with the worker thread.
//!
//! A [`Request`] travels from a calling thread to the worker through the
//! shared queue. Queries carry their own sink, on which the worker sends
//! [`RowEvent`]s back to the one caller that issued the query.

use rusqlite::types::{FromSql, Value, ValueRef};
use std::sync::mpsc::Sender;

use super::executor::ExecutorError;

/// Bound parameters for one statement, in positional order.
pub type Params = Vec<Value>;

/// Reply channel for tracked requests.
pub(crate) type Reply<T> = Sender<Result<T, ExecutorError>>;

/// A unit of work for the worker thread.
///
/// Immutable once enqueued and consumed exactly once.
pub(crate) enum Request {
    /// Run a statement that produces no rows of interest.
    Execute {
        sql: String,
        params: Params,
        reply: Option<Reply<usize>>,
    },
    /// Run a statement and stream every produced row to `sink`.
    Query {
        sql: String,
        params: Params,
        sink: Sender<RowEvent>,
    },
    /// Commit the open transaction, if any.
    Commit { reply: Option<Reply<()>> },
    /// Commit, close the connection and stop the worker.
    Close { ack: Reply<()> },
}

impl Request {
    /// Short label used in logs and metrics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Request::Execute { .. } => "execute",
            Request::Query { .. } => "query",
            Request::Commit { .. } => "commit",
            Request::Close { .. } => "close",
        }
    }
}

/// One event on a query's result sink.
///
/// A sink always ends with exactly one terminal event: `End` after the last
/// row, or `Failed` if the statement could not be run to completion.
#[derive(Debug)]
pub(crate) enum RowEvent {
    Row(Row),
    End,
    Failed(ExecutorError),
}

/// A single result row, detached from the connection that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from its column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of the column at `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Convert the column at `index` to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Column`] if the index is out of range or the
    /// stored value cannot be converted.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, ExecutorError> {
        let value = self.values.get(index).ok_or_else(|| ExecutorError::Column {
            index,
            message: format!("row has only {} columns", self.values.len()),
        })?;
        T::column_result(ValueRef::from(value)).map_err(|e| ExecutorError::Column {
            index,
            message: e.to_string(),
        })
    }

    /// Consume the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
