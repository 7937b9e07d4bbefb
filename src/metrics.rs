//! Process-level Prometheus metrics, trimmed from the teacher's much larger
//! `metrics/` subsystem down to the handful of counters this pipeline
//! actually emits.

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Registry, TextEncoder};

lazy_static! {
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Messages successfully decoded off the broker.
    pub static ref MESSAGES_PROCESSED: Counter = Counter::new(
        "otel_pipeline_messages_processed_total",
        "Total number of OTLP payloads decoded from the broker"
    )
    .expect("metric is well-formed");

    /// Windows closed by the reconstructor.
    pub static ref WINDOWS_CLOSED: Counter = Counter::new(
        "otel_pipeline_windows_closed_total",
        "Total number of trace windows closed"
    )
    .expect("metric is well-formed");

    /// Emit calls that failed and were dropped.
    pub static ref EMIT_FAILURES: Counter = Counter::new(
        "otel_pipeline_emit_failures_total",
        "Total number of backend emit calls that failed"
    )
    .expect("metric is well-formed");
}

/// Register all metrics with the global registry. Call once at startup.
pub fn init() {
    PROMETHEUS_REGISTRY
        .register(Box::new(MESSAGES_PROCESSED.clone()))
        .expect("metric registered once");
    PROMETHEUS_REGISTRY
        .register(Box::new(WINDOWS_CLOSED.clone()))
        .expect("metric registered once");
    PROMETHEUS_REGISTRY
        .register(Box::new(EMIT_FAILURES.clone()))
        .expect("metric registered once");
}

/// Render the registry in Prometheus text exposition format.
pub fn export() -> String {
    let encoder = TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("encoding never fails for well-formed metrics");
    String::from_utf8(buffer).expect("prometheus text output is valid utf-8")
}
