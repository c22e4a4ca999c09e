//! SQLite storage layer for Sqldict.
//!
//! Provides:
//! - Dedicated worker thread owning the single connection
//! - Ordered request queue shared by all calling threads
//! - Per-query row streaming back to the caller
//! - Connection pragmas and table statements

pub mod executor;
pub mod request;
pub mod rows;
pub mod schema;
