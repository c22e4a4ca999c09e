//! Sqldict self-test.
//!
//! Runs the dictionary through a fixed scenario, once in memory and once
//! against a fresh database file, and exits non-zero on the first failure.
//!
//! # Usage
//!
//! ```bash
//! sqldict --data-dir ./data --table shelf --log-level info
//! ```
//!
//! Environment variables can also be used:
//! - `SQLDICT_DATA_DIR`: Data directory for the database file
//! - `SQLDICT_TABLE`: Table name
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::{ensure, Context, Result};
use sqldict::config::Config;
use sqldict::observability::metrics::{counter_total, init_metrics};
use sqldict::observability::tracing::init_tracing;
use sqldict::{DictError, Location, OpenFlag, SqlDict};
use std::fs;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  Sqldict v{} - self-test

  Configuration:
    Database:   {}
    Table:      {}
    Autocommit: {}
    Log Level:  {}
"#,
        version,
        config.db_path().display(),
        config.table,
        config.autocommit,
        config.log_level
    );
}

fn collect<T>(iter: impl Iterator<Item = Result<T, DictError>>) -> Result<Vec<T>> {
    Ok(iter.collect::<Result<Vec<_>, _>>()?)
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn run_scenario(dict: &SqlDict<String>) -> Result<()> {
    ensure!(collect(dict.keys()?)?.is_empty(), "new table is not empty");
    ensure!(dict.len()? == 0, "new table has a nonzero length");
    ensure!(dict.is_empty()?, "new table reports entries");

    let long = "rsvp".repeat(100);
    dict.set("abc", &long)?;
    ensure!(dict.get("abc")? == long, "stored value mismatch");
    ensure!(dict.len()? == 1, "length after first insert");

    dict.set("abc", &"lmno".to_string())?;
    ensure!(dict.get("abc")? == "lmno", "overwrite did not take effect");
    ensure!(dict.len()? == 1, "length after overwrite");

    dict.delete("abc")?;
    ensure!(dict.is_empty()?, "table not empty after delete");
    ensure!(dict.len()? == 0, "length after delete");

    dict.set("abc", &"lmno".to_string())?;
    dict.set("xyz", &"pdq".to_string())?;
    ensure!(dict.len()? == 2, "length after two inserts");
    ensure!(
        collect(dict.items()?)? == pairs(&[("abc", "lmno"), ("xyz", "pdq")]),
        "items out of order"
    );
    ensure!(collect(dict.values()?)? == ["lmno", "pdq"], "values mismatch");
    ensure!(collect(dict.keys()?)? == ["abc", "xyz"], "keys mismatch");

    dict.update(pairs(&[("p", "x"), ("q", "y"), ("r", "z")]))?;
    ensure!(dict.len()? == 5, "length after bulk update");
    ensure!(
        collect(dict.items()?)?
            == pairs(&[
                ("abc", "lmno"),
                ("xyz", "pdq"),
                ("p", "x"),
                ("q", "y"),
                ("r", "z"),
            ]),
        "items after bulk update"
    );

    dict.delete("abc")?;
    ensure!(
        matches!(dict.get("abc"), Err(DictError::KeyNotFound(_))),
        "deleted key still readable"
    );
    ensure!(
        matches!(dict.delete("abc"), Err(DictError::KeyNotFound(_))),
        "second delete did not report a missing key"
    );
    ensure!(
        collect(dict.keys()?)? == ["xyz", "p", "q", "r"],
        "keys after delete"
    );
    ensure!(!dict.is_empty()?, "table empty after partial delete");

    dict.clear()?;
    ensure!(dict.is_empty()?, "table not empty after clear");
    ensure!(collect(dict.keys()?)?.is_empty(), "keys after clear");

    dict.update(pairs(&[("p", "x"), ("q", "y"), ("r", "z")]))?;
    ensure!(collect(dict.keys()?)? == ["p", "q", "r"], "keys after refill");
    dict.clear()?;
    ensure!(dict.is_empty()?, "table not empty after second clear");

    Ok(())
}

fn main() -> Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    // Metrics are recorded in-process only
    init_metrics();

    // Ensure data directory exists
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

    print_banner(&config);

    let runs = [
        ("memory", config.dict_config(Location::Memory, OpenFlag::Create)),
        (
            "file",
            config.dict_config(Location::file(config.db_path()), OpenFlag::New),
        ),
    ];

    for (label, dict_config) in runs {
        let dict: SqlDict<String> = SqlDict::open(dict_config)
            .with_context(|| format!("failed to open {label} database"))?;
        run_scenario(&dict).with_context(|| format!("self-test failed on {label} database"))?;
        dict.close()
            .with_context(|| format!("failed to close {label} database"))?;
        tracing::info!(database = label, "Self-test passed");
    }

    tracing::info!(
        requests = counter_total("sqldict_requests_total").unwrap_or(0),
        failures = counter_total("sqldict_request_failures_total").unwrap_or(0),
        "Request totals"
    );
    println!("all tests passed");
    Ok(())
}
