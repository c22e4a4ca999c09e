//! Connection setup and per-table statements.
//!
//! Table names cannot be bound as parameters, so they are validated once
//! and quoted into a fixed set of statements.

use rusqlite::Connection;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted table name.
pub const MAX_TABLE_NAME_LEN: usize = 128;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Location {
    /// Private in-memory database, discarded when the connection closes.
    #[default]
    Memory,
    /// Database file on disk, created if missing.
    File(PathBuf),
}

impl Location {
    /// Location of a database file.
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Location::File(path.as_ref().to_path_buf())
    }

    /// Path of the database file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Location::Memory => None,
            Location::File(path) => Some(path),
        }
    }

    /// Open a connection to this location.
    pub fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            Location::Memory => Connection::open_in_memory(),
            Location::File(path) => Connection::open(path),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => f.write_str(":memory:"),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Apply connection pragmas.
///
/// WAL is only requested for file databases; SQLite ignores it for
/// in-memory ones anyway.
pub fn apply_pragmas(
    conn: &Connection,
    location: &Location,
    busy_timeout: Duration,
    wal: bool,
) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    if wal && location.path().is_some() {
        // journal_mode returns the resulting mode as a row
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "Journal mode set");
    }
    Ok(())
}

/// Check that `name` is usable as a table name.
///
/// Accepts ASCII letters, digits and underscores, not starting with a digit.
pub fn validate_table_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("table name cannot be empty");
    }
    if name.len() > MAX_TABLE_NAME_LEN {
        return Err("table name too long (max 128 characters)");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("table name must contain only alphanumeric characters or underscores");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err("table name cannot start with a digit");
    }
    Ok(())
}

/// Statements for one `(key TEXT PRIMARY KEY, value BLOB)` table.
///
/// Iteration statements order by rowid: rows come back in the order each key
/// was last written, since insert-or-replace deletes and re-inserts.
#[derive(Debug, Clone)]
pub struct TableStatements {
    pub create: String,
    pub count: String,
    pub max_rowid: String,
    pub keys: String,
    pub values: String,
    pub items: String,
    pub contains: String,
    pub get: String,
    pub upsert: String,
    pub delete: String,
    pub clear: String,
}

impl TableStatements {
    /// Build the statements for `table`, which must already be validated.
    pub fn new(table: &str) -> Self {
        let t = format!("\"{table}\"");
        Self {
            create: format!("CREATE TABLE IF NOT EXISTS {t} (key TEXT PRIMARY KEY, value BLOB)"),
            count: format!("SELECT COUNT(*) FROM {t}"),
            max_rowid: format!("SELECT MAX(rowid) FROM {t}"),
            keys: format!("SELECT key FROM {t} ORDER BY rowid"),
            values: format!("SELECT value FROM {t} ORDER BY rowid"),
            items: format!("SELECT key, value FROM {t} ORDER BY rowid"),
            contains: format!("SELECT 1 FROM {t} WHERE key = ?1"),
            get: format!("SELECT value FROM {t} WHERE key = ?1"),
            upsert: format!("REPLACE INTO {t} (key, value) VALUES (?1, ?2)"),
            delete: format!("DELETE FROM {t} WHERE key = ?1"),
            // No VACUUM: it fails with "database schema has changed" while a
            // read cursor is open on the connection.
            clear: format!("DELETE FROM {t}"),
        }
    }
}
