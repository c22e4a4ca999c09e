//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging via `tracing`
//! - OpenTelemetry metrics for executor requests

pub mod metrics;
pub mod tracing;
