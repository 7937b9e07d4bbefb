use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single log record, parsed from OTLP resourceLogs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub trace_id: String,
    pub span_id: String,
    pub service_name: String,
    pub body: String,
    pub severity: String,
    pub timestamp: DateTime<Utc>,
}
