//! Tracing setup.
//!
//! Everything the worker does is logged from the `sqldict-worker` thread, so
//! the fmt layer prints thread names alongside the usual target and location.
//! Untracked failures and requests dropped by a close are logged at `warn`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the self-test binary.
///
/// `RUST_LOG` wins when set. Otherwise `default_filter` applies, usually the
/// `--log-level` value: `"info"` shows the executor lifecycle and
/// `"warn,sqldict=trace"` adds every statement the worker runs.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::debug!(default_filter, "Tracing initialized");
}

/// Quiet subscriber for tests: only errors, routed through the test harness.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
