use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trace::SpanSummary;

/// An anomaly alert, emitted once per service per window when any
/// constituent span was scored anomalous.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub service: String,
    pub route: String,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub duration_ms: f64,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    pub spans: Vec<SpanSummary>,
}
