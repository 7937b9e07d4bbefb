use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A span record as carried inside a reconstructed trace aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanSummary {
    pub name: String,
    pub service: String,
    pub duration_ms: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub trace_id: String,
    pub is_anomaly: bool,
    pub status_code: i64,
}

/// The fold accumulator for one (trace_id, window) key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceAggregate {
    pub duration_ms: f64,
    pub spans: Vec<SpanSummary>,
    pub has_anomaly: bool,
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for TraceAggregate {
    fn default() -> Self {
        Self {
            duration_ms: 0.0,
            spans: Vec::new(),
            has_anomaly: false,
            start_time: None,
        }
    }
}

impl TraceAggregate {
    /// Fold a single span into this accumulator.
    pub fn fold(&mut self, span: &SpanSummary) {
        self.duration_ms = self.duration_ms.max(span.duration_ms);
        self.has_anomaly = self.has_anomaly || span.is_anomaly;
        self.start_time = match (self.start_time, span.start_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (None, Some(b)) => Some(b),
            (a, None) => a,
        };
        self.spans.push(span.clone());
    }

    /// Merge another partial accumulator for the same key into this one.
    pub fn merge(&mut self, mut other: TraceAggregate) {
        self.duration_ms = self.duration_ms.max(other.duration_ms);
        self.has_anomaly = self.has_anomaly || other.has_anomaly;
        self.start_time = match (self.start_time, other.start_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (None, Some(b)) => Some(b),
            (a, None) => a,
        };
        self.spans.append(&mut other.spans);
    }
}

/// Persisted record of an anomalous trace, keyed uniquely by trace_id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceInventory {
    pub trace_id: String,
    pub duration_ms: f64,
    pub spans: Vec<SpanSummary>,
    pub ingest_timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(name: &str, duration_ms: f64, is_anomaly: bool) -> SpanSummary {
        SpanSummary {
            name: name.to_string(),
            service: "quote".to_string(),
            duration_ms,
            start_time: Some(Utc::now()),
            trace_id: "t1".to_string(),
            is_anomaly,
            status_code: 0,
        }
    }

    #[test]
    fn fold_tracks_max_duration_and_any_anomaly() {
        let mut agg = TraceAggregate::default();
        agg.fold(&span("a", 100.0, false));
        agg.fold(&span("b", 1500.0, true));
        assert_eq!(agg.duration_ms, 1500.0);
        assert!(agg.has_anomaly);
        assert_eq!(agg.spans.len(), 2);
    }

    #[test]
    fn merge_combines_two_partials() {
        let mut a = TraceAggregate::default();
        a.fold(&span("a", 100.0, false));
        let mut b = TraceAggregate::default();
        b.fold(&span("b", 1500.0, true));
        a.merge(b);
        assert_eq!(a.duration_ms, 1500.0);
        assert!(a.has_anomaly);
        assert_eq!(a.spans.len(), 2);
    }
}
