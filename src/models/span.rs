use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single span, parsed from OTLP and scored for latency anomaly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub span_name: String,
    pub route: String,
    pub duration_ms: f64,
    pub start_time: DateTime<Utc>,
    pub status_code: i64,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}
