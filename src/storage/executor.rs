//! Serializing executor: one worker thread owning the only connection.
//!
//! Any thread may submit work through an [`ExecutorHandle`]. Requests travel
//! over a single unbounded FIFO queue and the worker runs them one at a
//! time, in the order they were dequeued:
//!
//! ```text
//! caller ─┐
//! caller ─┼─> request queue ─> worker (Connection) ─┬─> row sink ─> caller
//! caller ─┘                                         └─> completion ─> caller
//! ```
//!
//! Writes and commits are fire-and-forget unless submitted as tracked
//! requests. Queries hand back a [`Rows`] iterator fed by a per-query sink.
//!
//! Ordering: the worker's dequeue order is the only total order. A commit
//! covers exactly the requests dequeued before it, whichever thread sent
//! them; read-your-writes holds only for one thread's own submissions.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::request::{Params, Reply, Request, Row, RowEvent};
use super::rows::Rows;
use super::schema::{apply_pragmas, Location};
use crate::observability::metrics::{record_discarded, record_request, record_rows_streamed};

/// Default time SQLite waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const WORKER_THREAD_NAME: &str = "sqldict-worker";

/// Error type for executor operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Failed to open database at {location}: {message}")]
    Open { location: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Column {index}: {message}")]
    Column { index: usize, message: String },

    #[error("Executor is closed")]
    Closed,

    #[error("Executor thread panicked")]
    ThreadPanic,

    #[error("Failed to spawn executor thread: {0}")]
    Spawn(String),

    #[error("Timed out after {0:?} waiting for the executor")]
    Timeout(Duration),
}

impl From<rusqlite::Error> for ExecutorError {
    fn from(e: rusqlite::Error) -> Self {
        ExecutorError::Database(e.to_string())
    }
}

/// Configuration for an executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Database location
    pub location: Location,
    /// Commit after every statement instead of on explicit commit
    pub autocommit: bool,
    /// How long SQLite retries on a locked database
    pub busy_timeout: Duration,
    /// Use WAL journal mode (file databases only)
    pub wal: bool,
    /// Bound on each wait for a row or a completion; `None` waits forever
    pub row_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            location: Location::Memory,
            autocommit: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: false,
            row_timeout: None,
        }
    }
}

impl ExecutorConfig {
    /// Create a config for the given location with default settings.
    pub fn new(location: Location) -> Self {
        Self {
            location,
            ..Self::default()
        }
    }

    /// Enable or disable autocommit.
    #[must_use]
    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Bound every wait for a row or a completion.
    #[must_use]
    pub fn with_row_timeout(mut self, timeout: Duration) -> Self {
        self.row_timeout = Some(timeout);
        self
    }
}

/// Pending result of a tracked request.
#[derive(Debug)]
pub struct Completion<T> {
    receiver: Receiver<Result<T, ExecutorError>>,
    timeout: Option<Duration>,
}

impl<T> Completion<T> {
    /// Block until the worker has run the request.
    ///
    /// Honors the executor's row timeout, if one is configured.
    pub fn wait(self) -> Result<T, ExecutorError> {
        match self.timeout {
            Some(timeout) => self.wait_timeout(timeout),
            None => self.receiver.recv().map_err(|_| ExecutorError::Closed)?,
        }
    }

    /// Block for at most `timeout` until the worker has run the request.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, ExecutorError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ExecutorError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ExecutorError::Closed),
        }
    }
}

/// Cloneable handle for submitting work to the executor.
///
/// Handles are cheap to clone and may be used from any thread. None of them
/// touches the connection; they only enqueue requests.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    sender: Sender<Request>,
    row_timeout: Option<Duration>,
}

impl ExecutorHandle {
    fn send(&self, request: Request) -> Result<(), ExecutorError> {
        self.sender
            .send(request)
            .map_err(|_| ExecutorError::Closed)
    }

    fn completion<T>(&self, timeout: Option<Duration>) -> (Reply<T>, Completion<T>) {
        let (reply, receiver) = mpsc::channel();
        (reply, Completion { receiver, timeout })
    }

    /// Queue a statement without waiting for it to run.
    ///
    /// Only fails if the executor has stopped. Execution failures are
    /// logged and counted by the worker; use [`submit_tracked`] to observe
    /// them.
    ///
    /// [`submit_tracked`]: ExecutorHandle::submit_tracked
    pub fn submit(&self, sql: impl Into<String>, params: Params) -> Result<(), ExecutorError> {
        self.send(Request::Execute {
            sql: sql.into(),
            params,
            reply: None,
        })
    }

    /// Queue a statement and return a handle to its outcome.
    ///
    /// The completion yields the number of affected rows.
    pub fn submit_tracked(
        &self,
        sql: impl Into<String>,
        params: Params,
    ) -> Result<Completion<usize>, ExecutorError> {
        let (reply, completion) = self.completion(self.row_timeout);
        self.send(Request::Execute {
            sql: sql.into(),
            params,
            reply: Some(reply),
        })?;
        Ok(completion)
    }

    /// Run a statement and wait for the number of affected rows.
    pub fn execute(&self, sql: impl Into<String>, params: Params) -> Result<usize, ExecutorError> {
        self.submit_tracked(sql, params)?.wait()
    }

    /// Queue one request per parameter set, in order.
    ///
    /// Each set is an independent request: other threads may interleave
    /// their own requests between them.
    pub fn submit_many<I>(&self, sql: &str, param_sets: I) -> Result<(), ExecutorError>
    where
        I: IntoIterator<Item = Params>,
    {
        for params in param_sets {
            self.submit(sql, params)?;
        }
        Ok(())
    }

    /// Queue one tracked request per parameter set and wait for all of them.
    ///
    /// Returns the total number of affected rows, or the first failure.
    /// Failed sets do not stop later sets from running.
    pub fn execute_many<I>(&self, sql: &str, param_sets: I) -> Result<usize, ExecutorError>
    where
        I: IntoIterator<Item = Params>,
    {
        let completions = param_sets
            .into_iter()
            .map(|params| self.submit_tracked(sql, params))
            .collect::<Result<Vec<_>, _>>()?;

        let mut total = 0;
        let mut first_error = None;
        for completion in completions {
            match completion.wait() {
                Ok(changed) => total += changed,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    /// Queue a query and return its rows as a lazy iterator.
    ///
    /// Pulling from the iterator blocks until the worker reaches the query
    /// and produces the next row.
    pub fn query(&self, sql: impl Into<String>, params: Params) -> Result<Rows, ExecutorError> {
        let (sink, receiver) = mpsc::channel();
        self.send(Request::Query {
            sql: sql.into(),
            params,
            sink,
        })?;
        Ok(Rows::new(receiver, self.row_timeout))
    }

    /// Run a query and return only its first row.
    ///
    /// Remaining rows are discarded with the sink.
    pub fn query_one(
        &self,
        sql: impl Into<String>,
        params: Params,
    ) -> Result<Option<Row>, ExecutorError> {
        self.query(sql, params)?.next().transpose()
    }

    /// Queue a commit without waiting for it.
    pub fn commit(&self) -> Result<(), ExecutorError> {
        self.send(Request::Commit { reply: None })
    }

    /// Queue a commit and wait until it has been applied.
    pub fn commit_wait(&self) -> Result<(), ExecutorError> {
        let (reply, completion) = self.completion(self.row_timeout);
        self.send(Request::Commit { reply: Some(reply) })?;
        completion.wait()
    }

    /// Stop the worker and wait for its acknowledgment.
    ///
    /// The worker commits and closes the connection. Requests still queued
    /// behind the close are never run; their callers see
    /// [`ExecutorError::Closed`].
    pub fn close(&self) -> Result<(), ExecutorError> {
        let (ack, completion) = self.completion(None);
        self.send(Request::Close { ack })?;
        completion.wait()
    }

    /// Like [`close`](ExecutorHandle::close), waiting at most `timeout`.
    pub fn close_timeout(&self, timeout: Duration) -> Result<(), ExecutorError> {
        let (ack, completion) = self.completion(None);
        self.send(Request::Close { ack })?;
        completion.wait_timeout(timeout)
    }
}

/// Owner of the worker thread.
///
/// Dropping the executor closes it and joins the worker; call
/// [`close`](Executor::close) to observe the outcome.
#[derive(Debug)]
pub struct Executor {
    handle: ExecutorHandle,
    worker: Option<JoinHandle<()>>,
}

impl Executor {
    /// Open the connection on a new worker thread.
    ///
    /// Returns once the worker has opened the database, so an unusable
    /// location is reported here rather than on the first request.
    pub fn start(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let (sender, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let row_timeout = config.row_timeout;
        let location = config.location.to_string();
        let autocommit = config.autocommit;

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let conn = match open_connection(&config) {
                    Ok(conn) => conn,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                Worker::new(conn, config.autocommit).run(receiver);
            })
            .map_err(|e| ExecutorError::Spawn(e.to_string()))?;

        let ready = ready_rx.recv();
        if !matches!(ready, Ok(Ok(()))) {
            let panicked = worker.join().is_err();
            return match ready {
                Ok(Err(e)) => Err(e),
                _ if panicked => Err(ExecutorError::ThreadPanic),
                _ => Err(ExecutorError::Closed),
            };
        }

        tracing::info!(%location, autocommit, "Executor started");

        Ok(Self {
            handle: ExecutorHandle {
                sender,
                row_timeout,
            },
            worker: Some(worker),
        })
    }

    /// Get a handle for submitting work.
    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Close the executor and join the worker thread.
    pub fn close(mut self) -> Result<(), ExecutorError> {
        self.shutdown(None)
    }

    /// Close the executor, waiting at most `timeout` for the worker.
    ///
    /// On timeout the worker is left to finish on its own.
    pub fn close_timeout(mut self, timeout: Duration) -> Result<(), ExecutorError> {
        self.shutdown(Some(timeout))
    }

    fn shutdown(&mut self, timeout: Option<Duration>) -> Result<(), ExecutorError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let result = match timeout {
            Some(timeout) => self.handle.close_timeout(timeout),
            None => self.handle.close(),
        };
        // Already closed through another handle
        let result = match result {
            Err(ExecutorError::Closed) => Ok(()),
            other => other,
        };
        if matches!(result, Err(ExecutorError::Timeout(_))) {
            return result;
        }

        if worker.join().is_err() {
            return Err(ExecutorError::ThreadPanic);
        }
        tracing::info!("Executor stopped");
        result
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(None) {
            tracing::warn!(error = %e, "Failed to close executor on drop");
        }
    }
}

fn open_connection(config: &ExecutorConfig) -> Result<Connection, ExecutorError> {
    let open_error = |e: rusqlite::Error| ExecutorError::Open {
        location: config.location.to_string(),
        message: e.to_string(),
    };
    let conn = config.location.open().map_err(open_error)?;
    apply_pragmas(&conn, &config.location, config.busy_timeout, config.wal).map_err(open_error)?;
    Ok(conn)
}

/// The worker side: owns the connection for its whole life.
struct Worker {
    conn: Connection,
    autocommit: bool,
}

impl Worker {
    fn new(conn: Connection, autocommit: bool) -> Self {
        Self { conn, autocommit }
    }

    /// Process requests until a close request or until every handle is gone.
    fn run(self, receiver: Receiver<Request>) {
        while let Ok(request) = receiver.recv() {
            let kind = request.kind();
            let started = Instant::now();

            match request {
                Request::Execute { sql, params, reply } => {
                    let result = self.execute(&sql, &params);
                    report(kind, &sql, started, reply, result);
                }
                Request::Query { sql, params, sink } => {
                    let result = self.query(&sql, &params, &sink);
                    record_request(kind, started.elapsed().as_secs_f64(), result.is_ok());
                    match result {
                        Ok(streamed) => {
                            record_rows_streamed(streamed);
                            let _ = sink.send(RowEvent::End);
                        }
                        Err(e) => {
                            tracing::debug!(sql = %sql, error = %e, "Query failed");
                            let _ = sink.send(RowEvent::Failed(e));
                        }
                    }
                }
                Request::Commit { reply } => {
                    let result = self.commit();
                    report(kind, "COMMIT", started, reply, result);
                }
                Request::Close { ack } => {
                    let result = self.finish();
                    record_request(kind, started.elapsed().as_secs_f64(), result.is_ok());

                    // Requests still queued are dropped unexecuted; their
                    // callers see a closed channel. Later sends fail at once.
                    discard_queued(&receiver);
                    drop(receiver);
                    let _ = ack.send(result);
                    tracing::debug!("Worker stopped after close request");
                    return;
                }
            }
        }

        // Every handle dropped without an explicit close
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "Failed to close connection");
        }
        tracing::debug!("Worker stopped after all handles were dropped");
    }

    fn execute(&self, sql: &str, params: &Params) -> Result<usize, ExecutorError> {
        if !self.autocommit && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let changed = {
            let mut stmt = self.conn.prepare_cached(sql)?;
            stmt.execute(params_from_iter(params.iter()))?
        };
        tracing::trace!(sql, changed, "Statement executed");

        if self.autocommit {
            self.commit()?;
        }
        Ok(changed)
    }

    /// Stream every row to `sink`, returning how many were sent.
    fn query(
        &self,
        sql: &str,
        params: &Params,
        sink: &Sender<RowEvent>,
    ) -> Result<u64, ExecutorError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut streamed = 0;
        while let Some(row) = rows.next()? {
            let values = (0..columns)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if sink.send(RowEvent::Row(Row::new(values))).is_err() {
                tracing::trace!(sql, streamed, "Query abandoned by caller");
                break;
            }
            streamed += 1;
        }
        drop(rows);

        if self.autocommit {
            self.commit()?;
        }
        Ok(streamed)
    }

    fn commit(&self) -> Result<(), ExecutorError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
            tracing::trace!("Transaction committed");
        }
        Ok(())
    }

    fn finish(self) -> Result<(), ExecutorError> {
        let committed = self.commit();
        let closed = self.conn.close().map_err(|(_, e)| ExecutorError::from(e));
        committed.and(closed)
    }
}

/// Drop every request still queued behind a close, returning how many.
///
/// Dropping a request drops its reply channel or sink, so any caller
/// waiting on it sees [`ExecutorError::Closed`].
fn discard_queued(receiver: &Receiver<Request>) -> usize {
    let mut discarded = 0;
    for request in receiver.try_iter() {
        record_discarded(request.kind());
        discarded += 1;
    }
    if discarded > 0 {
        tracing::warn!(discarded, "Requests dropped after close");
    }
    discarded
}

/// Deliver a request outcome, or log it when nobody is waiting.
fn report<T>(
    kind: &'static str,
    sql: &str,
    started: Instant,
    reply: Option<Reply<T>>,
    result: Result<T, ExecutorError>,
) {
    record_request(kind, started.elapsed().as_secs_f64(), result.is_ok());
    match reply {
        Some(reply) => {
            if let Err(e) = &result {
                tracing::debug!(kind, sql, error = %e, "Tracked request failed");
            }
            let _ = reply.send(result);
        }
        None => {
            if let Err(e) = result {
                tracing::warn!(kind, sql, error = %e, "Request failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn start_memory() -> Executor {
        Executor::start(ExecutorConfig::default()).unwrap()
    }

    #[test]
    fn test_execute_and_query_in_order() {
        let executor = start_memory();
        let handle = executor.handle();

        handle
            .submit("CREATE TABLE t (n INTEGER)", Vec::new())
            .unwrap();
        for n in 0..5 {
            handle
                .submit("INSERT INTO t (n) VALUES (?1)", vec![Value::Integer(n)])
                .unwrap();
        }

        let values: Vec<i64> = handle
            .query("SELECT n FROM t ORDER BY rowid", Vec::new())
            .unwrap()
            .map(|row| row.unwrap().get::<i64>(0).unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);

        executor.close().unwrap();
    }

    #[test]
    fn test_execute_returns_changed_rows() {
        let executor = start_memory();
        let handle = executor.handle();

        handle
            .execute("CREATE TABLE t (k TEXT)", Vec::new())
            .unwrap();
        let changed = handle
            .execute_many(
                "INSERT INTO t (k) VALUES (?1)",
                vec![vec![text("a")], vec![text("b")], vec![text("c")]],
            )
            .unwrap();
        assert_eq!(changed, 3);

        let deleted = handle
            .execute("DELETE FROM t WHERE k != ?1", vec![text("a")])
            .unwrap();
        assert_eq!(deleted, 2);
    }

    #[test]
    fn test_query_one() {
        let executor = start_memory();
        let handle = executor.handle();

        handle
            .submit("CREATE TABLE t (n INTEGER)", Vec::new())
            .unwrap();
        assert!(handle
            .query_one("SELECT n FROM t", Vec::new())
            .unwrap()
            .is_none());

        handle
            .submit_many(
                "INSERT INTO t (n) VALUES (?1)",
                (1..=3).map(|n| vec![Value::Integer(n)]),
            )
            .unwrap();
        let first = handle
            .query_one("SELECT n FROM t ORDER BY n DESC", Vec::new())
            .unwrap()
            .unwrap();
        assert_eq!(first.get::<i64>(0).unwrap(), 3);

        // The abandoned sink does not disturb later requests
        let count = handle
            .query_one("SELECT COUNT(*) FROM t", Vec::new())
            .unwrap()
            .unwrap();
        assert_eq!(count.get::<i64>(0).unwrap(), 3);
    }

    #[test]
    fn test_failed_request_does_not_stop_worker() {
        let executor = start_memory();
        let handle = executor.handle();

        // Untracked failure is logged and skipped
        handle.submit("INSERT INTO missing VALUES (1)", Vec::new()).unwrap();

        let err = handle
            .execute("NOT EVEN SQL", Vec::new())
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Database(_)));

        let mut rows = handle.query("SELECT * FROM missing", Vec::new()).unwrap();
        assert!(matches!(rows.next(), Some(Err(ExecutorError::Database(_)))));
        assert!(rows.next().is_none());

        let row = handle.query_one("SELECT 42", Vec::new()).unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 42);
    }

    #[test]
    fn test_close_rejects_later_requests() {
        let executor = start_memory();
        let handle = executor.handle();

        handle.close().unwrap();

        assert_eq!(
            handle.submit("SELECT 1", Vec::new()).unwrap_err(),
            ExecutorError::Closed
        );
        assert_eq!(
            handle.query("SELECT 1", Vec::new()).unwrap_err(),
            ExecutorError::Closed
        );
        assert_eq!(handle.close().unwrap_err(), ExecutorError::Closed);

        // Owner close after a handle close is still clean
        executor.close().unwrap();
    }

    #[test]
    fn test_start_reports_open_failure() {
        let temp_dir = TempDir::new().unwrap();
        let location = Location::file(temp_dir.path().join("missing").join("test.db"));

        let err = Executor::start(ExecutorConfig::new(location)).unwrap_err();
        assert!(matches!(err, ExecutorError::Open { .. }));
    }

    #[test]
    fn test_manual_commit_visibility() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let executor = Executor::start(ExecutorConfig::new(Location::file(&db_path))).unwrap();
        let handle = executor.handle();

        handle
            .execute("CREATE TABLE t (n INTEGER)", Vec::new())
            .unwrap();
        handle.commit_wait().unwrap();
        handle
            .execute("INSERT INTO t (n) VALUES (1)", Vec::new())
            .unwrap();

        let outside = Connection::open(&db_path).unwrap();
        let count = |conn: &Connection| -> i64 {
            conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(count(&outside), 0);

        handle.commit_wait().unwrap();
        assert_eq!(count(&outside), 1);

        drop(outside);
        executor.close().unwrap();
    }

    #[test]
    fn test_autocommit_visibility() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = ExecutorConfig::new(Location::file(&db_path)).with_autocommit(true);
        let executor = Executor::start(config).unwrap();
        let handle = executor.handle();

        handle
            .execute("CREATE TABLE t (n INTEGER)", Vec::new())
            .unwrap();
        handle
            .execute("INSERT INTO t (n) VALUES (1)", Vec::new())
            .unwrap();

        let outside = Connection::open(&db_path).unwrap();
        let count: i64 = outside
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        drop(outside);
        executor.close().unwrap();
    }

    #[test]
    fn test_drop_commits_pending_writes() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let executor =
                Executor::start(ExecutorConfig::new(Location::file(&db_path))).unwrap();
            let handle = executor.handle();
            handle
                .submit("CREATE TABLE t (n INTEGER)", Vec::new())
                .unwrap();
            handle
                .submit("INSERT INTO t (n) VALUES (7)", Vec::new())
                .unwrap();
        }

        let conn = Connection::open(&db_path).unwrap();
        let n: i64 = conn
            .query_row("SELECT n FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 7);
    }

    #[test]
    fn test_discard_queued_releases_waiters() {
        let (sender, receiver) = mpsc::channel();
        let (reply, replies) = mpsc::channel();
        let (sink, events) = mpsc::channel();

        sender
            .send(Request::Execute {
                sql: "INSERT INTO t VALUES (1)".into(),
                params: Vec::new(),
                reply: Some(reply),
            })
            .unwrap();
        sender
            .send(Request::Query {
                sql: "SELECT 1".into(),
                params: Vec::new(),
                sink,
            })
            .unwrap();
        sender.send(Request::Commit { reply: None }).unwrap();

        assert_eq!(discard_queued(&receiver), 3);
        assert!(replies.recv().is_err());
        let mut rows = Rows::new(events, None);
        assert_eq!(rows.next().unwrap().unwrap_err(), ExecutorError::Closed);
        assert_eq!(discard_queued(&receiver), 0);
    }

    #[test]
    fn test_completion_timeout() {
        let (_reply, receiver) = mpsc::channel::<Result<(), ExecutorError>>();
        let completion = Completion {
            receiver,
            timeout: None,
        };
        let timeout = Duration::from_millis(10);
        assert_eq!(
            completion.wait_timeout(timeout).unwrap_err(),
            ExecutorError::Timeout(timeout)
        );
    }
}
