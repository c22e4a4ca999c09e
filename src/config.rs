//! Configuration parsing for the Sqldict self-test binary.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::dict::{DictConfig, OpenFlag, DEFAULT_TABLE};
use crate::storage::executor::ExecutorConfig;
use crate::storage::schema::Location;

/// File name of the on-disk self-test database.
pub const SELFTEST_DB_FILE: &str = "selftest.db";

/// Sqldict: a thread-safe SQLite-backed persistent dictionary.
#[derive(Parser, Debug, Clone)]
#[command(name = "sqldict")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Data directory for the on-disk database
    #[arg(short, long, env = "SQLDICT_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Table holding the dictionary
    #[arg(short, long, env = "SQLDICT_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Commit after every statement
    #[arg(long, env = "SQLDICT_AUTOCOMMIT")]
    pub autocommit: bool,

    /// Use WAL journal mode for file databases
    #[arg(long, env = "SQLDICT_WAL")]
    pub wal: bool,

    /// Maximum wait for each query row, in milliseconds
    #[arg(long, env = "SQLDICT_ROW_TIMEOUT_MS")]
    pub row_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Path of the on-disk database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(SELFTEST_DB_FILE)
    }

    /// Executor settings for `location`.
    pub fn executor_config(&self, location: Location) -> ExecutorConfig {
        ExecutorConfig {
            location,
            autocommit: self.autocommit,
            wal: self.wal,
            row_timeout: self.row_timeout_ms.map(Duration::from_millis),
            ..ExecutorConfig::default()
        }
    }

    /// Dictionary settings for `location`, opened with `flag`.
    pub fn dict_config(&self, location: Location, flag: OpenFlag) -> DictConfig {
        DictConfig {
            executor: self.executor_config(location),
            table: self.table.clone(),
            flag,
        }
    }

    /// Create a default configuration for testing.
    #[cfg(test)]
    pub fn test_config(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            table: "test_shelf".into(),
            autocommit: false,
            wal: false,
            row_timeout_ms: Some(5_000),
            log_level: "debug".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            table: DEFAULT_TABLE.into(),
            autocommit: false,
            wal: false,
            row_timeout_ms: None,
            log_level: "info".into(),
        }
    }
}
