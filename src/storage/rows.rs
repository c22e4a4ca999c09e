//! Pull-based iteration over a query's result sink.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use super::executor::ExecutorError;
use super::request::{Row, RowEvent};

/// Lazy, single-pass sequence of rows produced by one query.
///
/// Each call to `next` blocks the calling thread until the worker has
/// produced the next row or the end of the result. The worker itself never
/// waits on this side: the sink is unbounded. To read the same data again,
/// issue a new query.
///
/// Dropping a `Rows` early is fine. Rows already sent are freed with the
/// channel and the worker stops stepping the statement at the next row.
#[derive(Debug)]
pub struct Rows {
    receiver: Receiver<RowEvent>,
    timeout: Option<Duration>,
    finished: bool,
}

impl Rows {
    pub(crate) fn new(receiver: Receiver<RowEvent>, timeout: Option<Duration>) -> Self {
        Self {
            receiver,
            timeout,
            finished: false,
        }
    }

    /// Bound the wait for each row.
    ///
    /// When the bound expires the iterator yields
    /// [`ExecutorError::Timeout`] once and is then exhausted.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn recv(&self) -> Result<RowEvent, ExecutorError> {
        match self.timeout {
            Some(timeout) => self.receiver.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => ExecutorError::Timeout(timeout),
                RecvTimeoutError::Disconnected => ExecutorError::Closed,
            }),
            None => self.receiver.recv().map_err(|_| ExecutorError::Closed),
        }
    }
}

impl Iterator for Rows {
    type Item = Result<Row, ExecutorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.recv() {
            Ok(RowEvent::Row(row)) => Some(Ok(row)),
            Ok(RowEvent::End) => {
                self.finished = true;
                None
            }
            Ok(RowEvent::Failed(e)) | Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
