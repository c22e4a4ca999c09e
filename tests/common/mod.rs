//! Test utilities and fixtures for Sqldict tests.
//!
//! Provides:
//! - Temporary database directories
//! - Dictionary and executor constructors bound to the fixture

#![allow(dead_code)]

use sqldict::observability::tracing::init_test_tracing;
use sqldict::{DictConfig, Executor, ExecutorConfig, Location, SqlDict};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Generous bound so a broken worker fails a test instead of hanging it.
pub const TEST_ROW_TIMEOUT: Duration = Duration::from_secs(10);

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }

    /// Location of the fixture database.
    pub fn location(&self) -> Location {
        Location::file(&self.db_path)
    }

    /// Executor config for the fixture database.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new(self.location()).with_row_timeout(TEST_ROW_TIMEOUT)
    }

    /// Dictionary config for `table` in the fixture database.
    pub fn dict_config(&self, table: &str) -> DictConfig {
        DictConfig {
            executor: self.executor_config(),
            ..DictConfig::new(self.location(), table)
        }
    }

    /// Open a JSON-coded dictionary on `table`.
    pub fn open_dict<V>(&self, table: &str) -> SqlDict<V>
    where
        V: serde::Serialize + serde::de::DeserializeOwned,
    {
        SqlDict::open(self.dict_config(table)).expect("failed to open dict")
    }

    /// Start an executor on the fixture database.
    pub fn start_executor(&self) -> Executor {
        Executor::start(self.executor_config()).expect("failed to start executor")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory dictionary config with the test timeout applied.
pub fn memory_config(table: &str) -> DictConfig {
    init_test_tracing();
    let mut config = DictConfig::in_memory(table);
    config.executor.row_timeout = Some(TEST_ROW_TIMEOUT);
    config
}

/// Collect a fallible iterator, panicking on the first error.
pub fn collect_ok<T, E: std::fmt::Debug>(iter: impl Iterator<Item = Result<T, E>>) -> Vec<T> {
    iter.map(|item| item.expect("iteration failed")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.temp_dir.path().exists());
        assert!(fixture.db_path.ends_with("test.db"));
    }
}
