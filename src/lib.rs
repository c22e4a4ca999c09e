//! Sqldict: a thread-safe SQLite-backed persistent dictionary.
//!
//! SQLite connections must not be shared between threads, yet a dictionary
//! is most useful when any thread can read and write it. Sqldict solves this
//! by funnelling every statement through one worker thread that owns the
//! only connection.
//!
//! # Architecture
//!
//! - **Serializing executor**: one worker thread, one connection, one FIFO
//!   request queue fed by any number of threads
//! - **Streaming results**: each query gets its own unbounded row channel,
//!   so the worker never waits on a slow reader
//! - **Mapping facade**: get/set/delete/iterate over a single
//!   `(key TEXT PRIMARY KEY, value BLOB)` table
//! - **Pluggable codec**: values are encoded to blobs with `serde_json` by
//!   default
//!
//! # Modules
//!
//! - [`codec`]: Value encoding to and from stored blobs
//! - [`config`]: CLI and environment configuration for the self-test binary
//! - [`dict`]: The dictionary facade
//! - [`observability`]: Metrics and tracing setup
//! - [`storage`]: The serializing executor and SQLite plumbing
//!
//! # Example
//!
//! ```
//! use sqldict::{DictConfig, SqlDict};
//!
//! let dict: SqlDict<String> = SqlDict::open(DictConfig::in_memory("shelf")).unwrap();
//! dict.set("greeting", &"hello".to_string()).unwrap();
//! assert_eq!(dict.get("greeting").unwrap(), "hello");
//! dict.close().unwrap();
//! ```

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // storage::executor::ExecutorError is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
    clippy::too_many_lines              // Some functions are inherently long
)]

pub mod codec;
pub mod config;
pub mod dict;
pub mod observability;
pub mod storage;

pub use codec::{Codec, CodecError, JsonCodec, RawCodec};
pub use dict::{DictConfig, DictError, OpenFlag, SqlDict};
pub use storage::executor::{Completion, Executor, ExecutorConfig, ExecutorError, ExecutorHandle};
pub use storage::request::{Params, Row};
pub use storage::rows::Rows;
pub use storage::schema::Location;
