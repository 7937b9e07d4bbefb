use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Throughput,
    P99Latency,
    RedactionCount,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Throughput => "throughput",
            MetricType::P99Latency => "p99_latency",
            MetricType::RedactionCount => "redaction_count",
        }
    }
}

impl std::str::FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "throughput" => Ok(MetricType::Throughput),
            "p99_latency" => Ok(MetricType::P99Latency),
            "redaction_count" => Ok(MetricType::RedactionCount),
            other => Err(format!("unknown metric_type: {other}")),
        }
    }
}

/// A single per-service metric sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub service: String,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}
