//! Logging of requests dropped by a close.
//!
//! Installs a process-wide subscriber, so it lives in its own test binary
//! without the shared fixtures (their tests install the quiet one).

use rusqlite::Connection;
use sqldict::observability::metrics::{counter_total, init_metrics};
use sqldict::{Executor, ExecutorConfig, ExecutorError, Location};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Log sink shared with the subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_requests_dropped_by_close_are_logged() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("subscriber already set");
    init_metrics();

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let mut config = ExecutorConfig::new(Location::file(&db_path))
        .with_row_timeout(Duration::from_secs(10));
    config.busy_timeout = Duration::from_secs(30);
    let executor = Executor::start(config).unwrap();
    let handle = executor.handle();
    handle
        .execute("CREATE TABLE t (n INTEGER)", Vec::new())
        .unwrap();
    handle.commit_wait().unwrap();

    // Hold the write lock so the worker stalls on the next insert
    let outside = Connection::open(&db_path).unwrap();
    outside.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let blocked = handle
        .submit_tracked("INSERT INTO t (n) VALUES (0)", Vec::new())
        .unwrap();
    assert!(matches!(
        handle.close_timeout(Duration::from_millis(50)),
        Err(ExecutorError::Timeout(_))
    ));

    // Queued behind the close while the worker is still stalled
    let behind_close: Vec<_> = (1..=5)
        .map(|n| {
            handle
                .submit_tracked(format!("INSERT INTO t (n) VALUES ({n})"), Vec::new())
                .unwrap()
        })
        .collect();

    outside.execute_batch("COMMIT").unwrap();

    assert_eq!(blocked.wait().unwrap(), 1);
    for completion in behind_close {
        assert_eq!(completion.wait().unwrap_err(), ExecutorError::Closed);
    }
    executor.close().unwrap();

    let output = logs.contents();
    assert!(output.contains("Requests dropped after close"), "{output}");
    assert!(output.contains("discarded="), "{output}");
    assert!(counter_total("sqldict_requests_discarded_total").unwrap() >= 5);

    let count: i64 = outside
        .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
