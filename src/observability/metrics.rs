//! OpenTelemetry metrics implementation.
//!
//! Key metrics:
//! - sqldict_requests_total: Counter for requests run by the worker
//! - sqldict_request_failures_total: Counter for failed requests
//! - sqldict_request_latency_seconds: Histogram for time spent in the worker
//! - sqldict_rows_streamed_total: Counter for rows sent to query sinks
//! - sqldict_requests_discarded_total: Counter for requests dropped by a close
//!
//! Metrics are recorded into a manual reader and never exported over the
//! network; [`counter_total`] reads them back in-process. Recording is a
//! no-op until [`init_metrics`] has been called.

use opentelemetry::metrics::{Counter, Histogram, Meter, Result as MetricsResult};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::data::{ResourceMetrics, Sum, Temporality};
use opentelemetry_sdk::metrics::reader::{MetricReader, TemporalitySelector};
use opentelemetry_sdk::metrics::{InstrumentKind, ManualReader, Pipeline, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use std::sync::{Arc, OnceLock, Weak};

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Sqldict metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of requests run by the worker.
    pub requests_total: Counter<u64>,
    /// Total number of requests that failed.
    pub request_failures_total: Counter<u64>,
    /// Histogram of time spent running a request in seconds.
    pub request_latency: Histogram<f64>,
    /// Total number of rows sent to query sinks.
    pub rows_streamed_total: Counter<u64>,
    /// Total number of queued requests dropped by a close.
    pub requests_discarded_total: Counter<u64>,
    reader: SharedReader,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter, reader: SharedReader) -> Self {
        Self {
            requests_total: meter
                .u64_counter("sqldict_requests_total")
                .with_description("Total number of requests run by the worker")
                .with_unit("1")
                .init(),
            request_failures_total: meter
                .u64_counter("sqldict_request_failures_total")
                .with_description("Total number of requests that failed")
                .with_unit("1")
                .init(),
            request_latency: meter
                .f64_histogram("sqldict_request_latency_seconds")
                .with_description("Time from dequeue to completion in the worker")
                .with_unit("s")
                .init(),
            rows_streamed_total: meter
                .u64_counter("sqldict_rows_streamed_total")
                .with_description("Total number of rows sent to query sinks")
                .with_unit("1")
                .init(),
            requests_discarded_total: meter
                .u64_counter("sqldict_requests_discarded_total")
                .with_description("Total number of queued requests dropped by a close")
                .with_unit("1")
                .init(),
            reader,
        }
    }
}

/// Manual reader shared by the meter provider and [`counter_total`].
#[derive(Debug, Clone)]
struct SharedReader(Arc<ManualReader>);

impl TemporalitySelector for SharedReader {
    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        self.0.temporality(kind)
    }
}

impl MetricReader for SharedReader {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        self.0.register_pipeline(pipeline);
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> MetricsResult<()> {
        self.0.collect(rm)
    }

    fn force_flush(&self) -> MetricsResult<()> {
        self.0.force_flush()
    }

    fn shutdown(&self) -> MetricsResult<()> {
        self.0.shutdown()
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
pub fn init_metrics() {
    METRICS.get_or_init(|| {
        let reader = SharedReader(Arc::new(ManualReader::builder().build()));
        let provider = SdkMeterProvider::builder()
            .with_reader(reader.clone())
            .build();
        global::set_meter_provider(provider);

        let meter = global::meter("sqldict");
        Metrics::new(&meter, reader)
    });
}

/// Get the global metrics instance, if initialized.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Record one request handled by the worker.
pub fn record_request(kind: &'static str, latency_seconds: f64, ok: bool) {
    if let Some(m) = METRICS.get() {
        let attrs = [KeyValue::new("kind", kind)];
        m.requests_total.add(1, &attrs);
        m.request_latency.record(latency_seconds, &attrs);
        if !ok {
            m.request_failures_total.add(1, &attrs);
        }
    }
}

/// Record rows streamed by one query.
pub fn record_rows_streamed(rows: u64) {
    if let Some(m) = METRICS.get() {
        m.rows_streamed_total.add(rows, &[]);
    }
}

/// Record one queued request dropped by a close.
pub fn record_discarded(kind: &'static str) {
    if let Some(m) = METRICS.get() {
        m.requests_discarded_total
            .add(1, &[KeyValue::new("kind", kind)]);
    }
}

/// Current value of the counter `name`, summed over all attributes.
///
/// Returns `None` before [`init_metrics`] or if nothing was recorded yet.
pub fn counter_total(name: &str) -> Option<u64> {
    let m = METRICS.get()?;
    let mut rm = ResourceMetrics {
        resource: Resource::empty(),
        scope_metrics: Vec::new(),
    };
    if let Err(e) = m.reader.collect(&mut rm) {
        tracing::debug!(error = %e, "Metrics collection failed");
        return None;
    }

    rm.scope_metrics
        .iter()
        .flat_map(|scope| &scope.metrics)
        .filter(|metric| metric.name == name)
        .filter_map(|metric| metric.data.as_any().downcast_ref::<Sum<u64>>())
        .flat_map(|sum| sum.data_points.iter().map(|point| point.value))
        .reduce(|a, b| a + b)
}
