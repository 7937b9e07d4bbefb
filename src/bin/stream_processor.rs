//! The windowed stream-processing dataflow: broker -> parse/score ->
//! windowed reconstruction -> emit, with a co-keyed log correlation buffer.
//! Task layout (grounded on the teacher's `main.rs` one-task-per-subsystem
//! pattern, fanned between stages with `mpsc` channels):
//!
//!   1. broker poll      - pulls decoded JSON off the stream queue
//!   2. parse + score    - extracts spans/logs, scores span latency
//!   3. reconstruct+emit - folds spans into windows, closes and emits
//!   4. log buffer       - buffers logs and runs the redaction audit
//!
//! Stages 3 and 4 share the log buffer directly (the two logical streams
//! named in the log-correlation-buffer contract: the logs producer and the
//! trace-close consumer).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use otel_pipeline::broker::BrokerSource;
use otel_pipeline::config::Config;
use otel_pipeline::emitter::Emitter;
use otel_pipeline::logbuffer::{LogBuffer, RedactionCounters};
use otel_pipeline::models::alert::Alert;
use otel_pipeline::models::log::LogRecord;
use otel_pipeline::models::metric::{MetricSample, MetricType};
use otel_pipeline::models::span::ScoredSpan;
use otel_pipeline::models::trace::TraceInventory;
use otel_pipeline::parser::{parse_log_payload, parse_trace_payload};
use otel_pipeline::reconstruct::Reconstructor;
use otel_pipeline::scorer::ScorerRegistry;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.observability.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("failed to load config ({e}), using defaults");
        toml::from_str(include_str!("../../config/default.toml")).expect("bundled default.toml is valid")
    });

    init_tracing(&config);
    otel_pipeline::metrics::init();

    tracing::info!(
        queue = %config.broker.queue_name,
        window_secs = config.window.length_secs,
        "starting stream processor"
    );

    let scorer_registry = Arc::new(ScorerRegistry::new());
    let log_buffer = Arc::new(LogBuffer::new(config.window.log_buffer_cap));
    let redaction_counters = Arc::new(RedactionCounters::new(config.window.redaction_emit_every));
    let reconstructor = Arc::new(Reconstructor::new(config.window.length_secs));
    let emitter = Arc::new(Emitter::new(
        config.emitter.backend_url.clone(),
        config.emitter.timeout_secs,
    ));

    let (scored_tx, scored_rx) = mpsc::channel::<ScoredSpan>(1024);
    let (log_tx, log_rx) = mpsc::channel::<LogRecord>(1024);

    let parse_handle = {
        let scorer_registry = Arc::clone(&scorer_registry);
        let broker_config = config.broker.clone();
        tokio::spawn(async move {
            let mut source = BrokerSource::new(broker_config);
            loop {
                for payload in source.next_batch().await {
                    otel_pipeline::metrics::MESSAGES_PROCESSED.inc();

                    for mut span in parse_trace_payload(&payload) {
                        let (score, is_anomaly) =
                            scorer_registry.score(&span.service_name, span.duration_ms);
                        span.anomaly_score = score;
                        span.is_anomaly = is_anomaly;
                        if scored_tx.send(span).await.is_err() {
                            return;
                        }
                    }
                    for log in parse_log_payload(&payload) {
                        if log_tx.send(log).await.is_err() {
                            return;
                        }
                    }
                }
            }
        })
    };

    let log_handle = {
        let log_buffer = Arc::clone(&log_buffer);
        let redaction_counters = Arc::clone(&redaction_counters);
        let emitter = Arc::clone(&emitter);
        let mut log_rx = log_rx;
        tokio::spawn(async move {
            while let Some(log) = log_rx.recv().await {
                if let Some(count) = redaction_counters.observe(&log.service_name, &log.body) {
                    emitter
                        .emit_metric(&MetricSample {
                            id: None,
                            service: log.service_name.clone(),
                            metric_type: MetricType::RedactionCount,
                            value: count as f64,
                            timestamp: Utc::now(),
                        })
                        .await;
                }
                log_buffer.push(log);
            }
        })
    };

    let reconstruct_handle = {
        let reconstructor = Arc::clone(&reconstructor);
        let log_buffer = Arc::clone(&log_buffer);
        let emitter = Arc::clone(&emitter);
        let sweep_ttl = chrono::Duration::seconds(config.window.log_buffer_ttl_secs);
        let mut scored_rx = scored_rx;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    maybe_span = scored_rx.recv() => {
                        match maybe_span {
                            Some(span) => reconstructor.ingest(span, Utc::now()),
                            None => return,
                        }
                    }
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        let closed = reconstructor.close_elapsed(now);
                        for (trace_id, aggregate) in closed {
                            otel_pipeline::metrics::WINDOWS_CLOSED.inc();
                            process_window_close(&trace_id, &aggregate, &log_buffer, &emitter, now).await;
                        }
                        log_buffer.sweep(sweep_ttl, now);
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = parse_handle => tracing::error!("broker/parse task exited"),
        _ = log_handle => tracing::error!("log-buffer task exited"),
        _ = reconstruct_handle => tracing::error!("reconstruct/emit task exited"),
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
    }

    Ok(())
}

/// On window close: emit the full trace and flush correlated logs when
/// anomalous, otherwise discard the log buffer entry; always derive and
/// emit per-service throughput/latency, and an alert when any constituent
/// span in that service was anomalous.
async fn process_window_close(
    trace_id: &str,
    aggregate: &otel_pipeline::models::trace::TraceAggregate,
    log_buffer: &LogBuffer,
    emitter: &Emitter,
    now: chrono::DateTime<Utc>,
) {
    if aggregate.spans.is_empty() {
        return;
    }

    if aggregate.has_anomaly {
        emitter
            .emit_trace(&TraceInventory {
                trace_id: trace_id.to_string(),
                duration_ms: aggregate.duration_ms,
                spans: aggregate.spans.clone(),
                ingest_timestamp: now,
            })
            .await;

        if let Some(logs) = log_buffer.flush(trace_id) {
            for log in logs {
                emitter.emit_log(&log).await;
            }
        }
    } else {
        log_buffer.discard(trace_id);
    }

    let mut services: Vec<&str> = aggregate.spans.iter().map(|s| s.service.as_str()).collect();
    services.sort_unstable();
    services.dedup();

    for service in services {
        let svc_spans: Vec<_> = aggregate
            .spans
            .iter()
            .filter(|s| s.service == service)
            .collect();

        let avg_latency =
            svc_spans.iter().map(|s| s.duration_ms).sum::<f64>() / svc_spans.len() as f64;

        emitter
            .emit_metric(&MetricSample {
                id: None,
                service: service.to_string(),
                metric_type: MetricType::Throughput,
                value: svc_spans.len() as f64,
                timestamp: now,
            })
            .await;

        emitter
            .emit_metric(&MetricSample {
                id: None,
                service: service.to_string(),
                metric_type: MetricType::P99Latency,
                value: avg_latency,
                timestamp: now,
            })
            .await;

        if svc_spans.iter().any(|s| s.is_anomaly) {
            emitter
                .emit_alert(&Alert {
                    id: None,
                    service: service.to_string(),
                    route: svc_spans[0].name.clone(),
                    anomaly_score: 1.0,
                    is_anomaly: true,
                    duration_ms: avg_latency,
                    trace_id: trace_id.to_string(),
                    timestamp: now,
                    spans: svc_spans.into_iter().take(10).cloned().collect(),
                })
                .await;
        }
    }
}
