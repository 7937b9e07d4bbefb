//! Fan-out from the dataflow to the backend over HTTP, with a short total
//! timeout. Failures are logged and swallowed: the dataflow must never
//! block on, or fail because of, the backend. Grounded on the teacher's
//! `WebhookSender`, trimmed to fire-and-forget semantics (no `Result`
//! returned to the caller).

use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::models::alert::Alert;
use crate::models::metric::MetricSample;
use crate::models::trace::TraceInventory;
use crate::models::log::LogRecord;

#[derive(Clone)]
pub struct Emitter {
    client: Client,
    backend_url: String,
}

impl Emitter {
    pub fn new(backend_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client configuration is always valid");
        Self {
            client,
            backend_url: backend_url.into(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) {
        let url = format!("{}{}", self.backend_url, path);
        if let Err(e) = self.client.post(&url).json(&body).send().await {
            crate::metrics::EMIT_FAILURES.inc();
            tracing::warn!(path = %path, error = %e, "emit failed, dropping");
        }
    }

    /// Full-trace event — only sent when the window aggregate is anomalous.
    pub async fn emit_trace(&self, inventory: &TraceInventory) {
        self.post(
            "/api/traces",
            json!({
                "trace_id": inventory.trace_id,
                "duration_ms": inventory.duration_ms,
                "spans": inventory.spans,
            }),
        )
        .await;
    }

    pub async fn emit_metric(&self, metric: &MetricSample) {
        self.post(
            "/api/metrics",
            json!({
                "service": metric.service,
                "metric_type": metric.metric_type.as_str(),
                "value": metric.value,
                "timestamp": metric.timestamp,
            }),
        )
        .await;
    }

    /// Alert event — only sent when at least one constituent span is
    /// anomalous. `anomaly_score` is hard-coded to 1.0 rather than derived
    /// from the max constituent score, matching the original's behavior.
    pub async fn emit_alert(&self, alert: &Alert) {
        self.post(
            "/api/alerts",
            json!({
                "service": alert.service,
                "route": alert.route,
                "anomaly_score": alert.anomaly_score,
                "is_anomaly": alert.is_anomaly,
                "duration_ms": alert.duration_ms,
                "trace_id": alert.trace_id,
                "timestamp": alert.timestamp,
                "spans": alert.spans,
            }),
        )
        .await;
    }

    pub async fn emit_log(&self, log: &LogRecord) {
        self.post(
            "/api/logs",
            json!({
                "trace_id": log.trace_id,
                "span_id": log.span_id,
                "service_name": log.service_name,
                "body": log.body,
                "severity": log.severity,
                "timestamp": log.timestamp,
            }),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metric() -> MetricSample {
        MetricSample {
            id: None,
            service: "quote".to_string(),
            metric_type: crate::models::metric::MetricType::Throughput,
            value: 3.0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn emit_metric_posts_to_backend() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/metrics")
            .with_status(200)
            .create_async()
            .await;

        let emitter = Emitter::new(server.url(), 1);
        emitter.emit_metric(&metric()).await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn emit_never_panics_when_backend_unreachable() {
        // Port 0 is never a live listener; the client should time out or
        // connection-refuse and the call should still return normally.
        let emitter = Emitter::new("http://127.0.0.1:0", 1);
        emitter.emit_metric(&metric()).await;
    }
}
