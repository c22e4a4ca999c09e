//! Dictionary facade over a single SQLite table.
//!
//! Every operation becomes one or more parameterized statements submitted to
//! the [`Executor`]; the facade never touches a connection itself. Writes
//! are fire-and-forget, reads block until the worker reaches them, so a
//! thread always observes its own earlier writes.

use rusqlite::types::Value;
use std::borrow::Borrow;
use std::fmt;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::codec::{Codec, CodecError, JsonCodec};
use crate::storage::executor::{Executor, ExecutorConfig, ExecutorError, ExecutorHandle};
use crate::storage::request::{Params, Row};
use crate::storage::rows::Rows;
use crate::storage::schema::{validate_table_name, Location, TableStatements};

/// Table used when none is given.
pub const DEFAULT_TABLE: &str = "shelf";

/// Error type for dictionary operations.
#[derive(Debug, Error)]
pub enum DictError {
    #[error("Key not found: {0:?}")]
    KeyNotFound(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("Invalid table name {name:?}: {reason}")]
    InvalidTableName { name: String, reason: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How to treat existing data when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenFlag {
    /// Open for read/write, creating the database and table if needed.
    #[default]
    Create,
    /// Like `Create`, but empty the table first.
    Truncate,
    /// Delete the database file first, including every other table in it.
    New,
}

impl FromStr for OpenFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" | "create" => Ok(OpenFlag::Create),
            "w" | "truncate" => Ok(OpenFlag::Truncate),
            "n" | "new" => Ok(OpenFlag::New),
            other => Err(format!("unknown open flag {other:?} (expected c, w or n)")),
        }
    }
}

impl fmt::Display for OpenFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpenFlag::Create => "c",
            OpenFlag::Truncate => "w",
            OpenFlag::New => "n",
        })
    }
}

/// Configuration for opening a [`SqlDict`].
#[derive(Debug, Clone)]
pub struct DictConfig {
    /// Executor settings, including the database location
    pub executor: ExecutorConfig,
    /// Table holding this dictionary
    pub table: String,
    /// Treatment of existing data
    pub flag: OpenFlag,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self::in_memory(DEFAULT_TABLE)
    }
}

impl DictConfig {
    /// Create a config for `table` at `location`.
    pub fn new(location: Location, table: impl Into<String>) -> Self {
        Self {
            executor: ExecutorConfig::new(location),
            table: table.into(),
            flag: OpenFlag::default(),
        }
    }

    /// Config for a table in a private in-memory database.
    pub fn in_memory(table: impl Into<String>) -> Self {
        Self::new(Location::Memory, table)
    }

    /// Config for a table in a database file.
    pub fn file<P: AsRef<Path>>(path: P, table: impl Into<String>) -> Self {
        Self::new(Location::file(path), table)
    }

    #[must_use]
    pub fn with_flag(mut self, flag: OpenFlag) -> Self {
        self.flag = flag;
        self
    }

    #[must_use]
    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.executor.autocommit = autocommit;
        self
    }
}

/// A persistent string-keyed dictionary stored in one SQLite table.
///
/// `SqlDict` is `Send + Sync`; share it between threads by reference or in
/// an `Arc`. Keys are text; values are stored as blobs produced by the codec
/// `C` (JSON by default).
///
/// Without autocommit, writes become durable on [`commit`], [`sync`],
/// [`clear`] and [`close`].
///
/// [`commit`]: SqlDict::commit
/// [`sync`]: SqlDict::sync
/// [`clear`]: SqlDict::clear
/// [`close`]: SqlDict::close
pub struct SqlDict<V, C = JsonCodec> {
    handle: ExecutorHandle,
    executor: Option<Executor>,
    table: String,
    sql: TableStatements,
    codec: C,
    _value: PhantomData<fn() -> V>,
}

impl<V> SqlDict<V, JsonCodec>
where
    JsonCodec: Codec<V>,
{
    /// Open a dictionary with the JSON codec.
    pub fn open(config: DictConfig) -> Result<Self, DictError> {
        Self::open_with_codec(config, JsonCodec)
    }
}

impl<V, C> SqlDict<V, C>
where
    C: Codec<V>,
{
    /// Open a dictionary with its own executor.
    ///
    /// The table is created before this returns, so any storage problem is
    /// reported here.
    pub fn open_with_codec(config: DictConfig, codec: C) -> Result<Self, DictError> {
        check_table_name(&config.table)?;

        if config.flag == OpenFlag::New {
            if let Some(path) = config.executor.location.path() {
                remove_database(path)?;
            }
        }

        let executor = Executor::start(config.executor)?;
        let mut dict = Self::with_executor(executor.handle(), &config.table, codec)?;
        dict.executor = Some(executor);

        if config.flag == OpenFlag::Truncate {
            dict.clear()?;
        }

        tracing::debug!(table = %dict.table, flag = %config.flag, "Dictionary opened");
        Ok(dict)
    }

    /// Attach a dictionary to an executor owned elsewhere.
    ///
    /// Several tables in one database file can share a single executor this
    /// way. Closing such a dictionary only commits; the executor's owner is
    /// responsible for closing it.
    pub fn with_executor(handle: ExecutorHandle, table: &str, codec: C) -> Result<Self, DictError> {
        check_table_name(table)?;

        let dict = Self {
            handle,
            executor: None,
            table: table.to_string(),
            sql: TableStatements::new(table),
            codec,
            _value: PhantomData,
        };

        dict.handle.execute(dict.sql.create.as_str(), Vec::new())?;
        dict.handle.commit_wait()?;
        Ok(dict)
    }

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Handle to the executor serving this dictionary.
    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<V, DictError> {
        let row = self
            .handle
            .query_one(self.sql.get.as_str(), key_params(key))?
            .ok_or_else(|| DictError::KeyNotFound(key.to_string()))?;
        decode_column(&self.codec, &row, 0)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &V) -> Result<(), DictError> {
        let params = self.upsert_params(key, value)?;
        self.handle.submit(self.sql.upsert.as_str(), params)?;
        Ok(())
    }

    /// Remove `key`.
    ///
    /// The existence check and the delete are separate requests, so another
    /// thread may change `key` in between.
    pub fn delete(&self, key: &str) -> Result<(), DictError> {
        if !self.contains(key)? {
            return Err(DictError::KeyNotFound(key.to_string()));
        }
        self.handle.submit(self.sql.delete.as_str(), key_params(key))?;
        Ok(())
    }

    /// Check whether `key` is present.
    pub fn contains(&self, key: &str) -> Result<bool, DictError> {
        Ok(self
            .handle
            .query_one(self.sql.contains.as_str(), key_params(key))?
            .is_some())
    }

    /// Number of entries.
    pub fn len(&self) -> Result<usize, DictError> {
        let count = match self.handle.query_one(self.sql.count.as_str(), Vec::new())? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count as usize)
    }

    /// Check whether the table has no entries.
    ///
    /// Probes the largest rowid instead of counting rows.
    pub fn is_empty(&self) -> Result<bool, DictError> {
        let max_rowid = match self.handle.query_one(self.sql.max_rowid.as_str(), Vec::new())? {
            Some(row) => row.get::<Option<i64>>(0)?,
            None => None,
        };
        Ok(max_rowid.is_none())
    }

    /// Iterate over keys in rowid order.
    ///
    /// Rowid order is the order in which each key was last written.
    pub fn keys(&self) -> Result<Keys, DictError> {
        let rows = self.handle.query(self.sql.keys.as_str(), Vec::new())?;
        Ok(Keys { rows })
    }

    /// Iterate over decoded values in rowid order.
    pub fn values(&self) -> Result<Values<'_, V, C>, DictError> {
        let rows = self.handle.query(self.sql.values.as_str(), Vec::new())?;
        Ok(Values {
            rows,
            codec: &self.codec,
            _value: PhantomData,
        })
    }

    /// Iterate over `(key, value)` pairs in rowid order.
    pub fn items(&self) -> Result<Items<'_, V, C>, DictError> {
        let rows = self.handle.query(self.sql.items.as_str(), Vec::new())?;
        Ok(Items {
            rows,
            codec: &self.codec,
            _value: PhantomData,
        })
    }

    /// Remove every entry.
    ///
    /// Commits before and after the delete.
    pub fn clear(&self) -> Result<(), DictError> {
        self.handle.commit()?;
        self.handle.submit(self.sql.clear.as_str(), Vec::new())?;
        self.handle.commit()?;
        Ok(())
    }

    /// Store every pair, replacing existing keys.
    ///
    /// All values are encoded before anything is queued, so a codec failure
    /// leaves the table untouched.
    pub fn update<I, K, B>(&self, items: I) -> Result<(), DictError>
    where
        I: IntoIterator<Item = (K, B)>,
        K: AsRef<str>,
        B: Borrow<V>,
    {
        let param_sets = items
            .into_iter()
            .map(|(key, value)| self.upsert_params(key.as_ref(), Borrow::<V>::borrow(&value)))
            .collect::<Result<Vec<_>, _>>()?;
        self.handle
            .submit_many(self.sql.upsert.as_str(), param_sets)?;
        Ok(())
    }

    /// Store `items`, then `overrides` as a second pass.
    ///
    /// A key present in both ends up with its value from `overrides`.
    pub fn update_with<I, J, K, L, B, D>(&self, items: I, overrides: J) -> Result<(), DictError>
    where
        I: IntoIterator<Item = (K, B)>,
        J: IntoIterator<Item = (L, D)>,
        K: AsRef<str>,
        L: AsRef<str>,
        B: Borrow<V>,
        D: Borrow<V>,
    {
        self.update(items)?;
        self.update(overrides)
    }

    /// Queue a commit of everything written so far.
    pub fn commit(&self) -> Result<(), DictError> {
        self.handle.commit()?;
        Ok(())
    }

    /// Commit and wait until the commit has been applied.
    pub fn sync(&self) -> Result<(), DictError> {
        self.handle.commit_wait()?;
        Ok(())
    }

    /// Commit outstanding writes and release the executor.
    ///
    /// Stops the worker if this dictionary owns it.
    pub fn close(self) -> Result<(), DictError> {
        match self.executor {
            Some(executor) => executor.close()?,
            None => self.handle.commit_wait()?,
        }
        tracing::debug!(table = %self.table, "Dictionary closed");
        Ok(())
    }

    fn upsert_params(&self, key: &str, value: &V) -> Result<Params, DictError> {
        let blob = self.codec.encode(value)?;
        Ok(vec![Value::Text(key.to_string()), Value::Blob(blob)])
    }
}

impl<V, C> fmt::Debug for SqlDict<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlDict")
            .field("table", &self.table)
            .field("owns_executor", &self.executor.is_some())
            .finish_non_exhaustive()
    }
}

/// Iterator over keys, see [`SqlDict::keys`].
#[derive(Debug)]
pub struct Keys {
    rows: Rows,
}

impl Iterator for Keys {
    type Item = Result<String, DictError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.and_then(|row| row.get::<String>(0)).map_err(DictError::from))
    }
}

/// Iterator over values, see [`SqlDict::values`].
pub struct Values<'a, V, C> {
    rows: Rows,
    codec: &'a C,
    _value: PhantomData<fn() -> V>,
}

impl<V, C: Codec<V>> Iterator for Values<'_, V, C> {
    type Item = Result<V, DictError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(
            row.map_err(DictError::from)
                .and_then(|row| decode_column(self.codec, &row, 0)),
        )
    }
}

/// Iterator over `(key, value)` pairs, see [`SqlDict::items`].
pub struct Items<'a, V, C> {
    rows: Rows,
    codec: &'a C,
    _value: PhantomData<fn() -> V>,
}

impl<V, C: Codec<V>> Iterator for Items<'_, V, C> {
    type Item = Result<(String, V), DictError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.map_err(DictError::from).and_then(|row| {
            let key = row.get::<String>(0)?;
            let value = decode_column(self.codec, &row, 1)?;
            Ok((key, value))
        }))
    }
}

fn check_table_name(table: &str) -> Result<(), DictError> {
    validate_table_name(table).map_err(|reason| DictError::InvalidTableName {
        name: table.to_string(),
        reason,
    })
}

fn key_params(key: &str) -> Params {
    vec![Value::Text(key.to_string())]
}

/// Decode the blob in column `index`.
///
/// Anything other than a blob (NULL, or text written by another tool) is a
/// column error, not a codec error.
fn decode_column<V, C: Codec<V>>(codec: &C, row: &Row, index: usize) -> Result<V, DictError> {
    match row.value(index) {
        Some(Value::Blob(bytes)) => Ok(codec.decode(bytes)?),
        Some(other) => Err(ExecutorError::Column {
            index,
            message: format!("expected a blob, found {}", other.data_type()),
        }
        .into()),
        None => Err(ExecutorError::Column {
            index,
            message: format!("row has only {} columns", row.len()),
        }
        .into()),
    }
}

/// Delete a database file and its journal side files.
fn remove_database(path: &Path) -> Result<(), DictError> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        targets.push(PathBuf::from(side));
    }

    for target in targets {
        match fs::remove_file(&target) {
            Ok(()) => tracing::info!(path = %target.display(), "Removed existing database file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
