//! Tumbling-window trace reconstruction, keyed by trace id. Windows are
//! 10-second buckets aligned to a fixed epoch and driven by wall-clock time,
//! mirroring the original dataflow's `TumblingWindower`.

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;

use crate::models::span::ScoredSpan;
use crate::models::trace::{SpanSummary, TraceAggregate};

/// The fixed alignment epoch windows are bucketed against.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub trace_id: String,
    pub window_start: DateTime<Utc>,
}

/// Keyed, tumbling-window fold table. Spans are folded into the bucket
/// whose window they land in at the moment they are observed; a span that
/// arrives after its window has already closed lands in the next bucket
/// instead (the accepted split-trace limitation).
pub struct Reconstructor {
    window_len: chrono::Duration,
    table: DashMap<WindowKey, TraceAggregate>,
}

impl Reconstructor {
    pub fn new(window_len_secs: i64) -> Self {
        Self {
            window_len: chrono::Duration::seconds(window_len_secs),
            table: DashMap::new(),
        }
    }

    /// Floor a timestamp to its tumbling-window bucket start.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let elapsed = ts - epoch();
        let window_ms = self.window_len.num_milliseconds().max(1);
        let elapsed_ms = elapsed.num_milliseconds();
        let bucket_index = elapsed_ms.div_euclid(window_ms);
        epoch() + chrono::Duration::milliseconds(bucket_index * window_ms)
    }

    /// Fold one scored span into its current window bucket.
    pub fn ingest(&self, span: ScoredSpan, now: DateTime<Utc>) {
        let window_start = self.bucket_start(now);
        let key = WindowKey {
            trace_id: span.trace_id.clone(),
            window_start,
        };
        let summary = SpanSummary {
            name: span.route,
            service: span.service_name,
            duration_ms: span.duration_ms,
            start_time: Some(span.start_time),
            trace_id: span.trace_id,
            is_anomaly: span.is_anomaly,
            status_code: span.status_code,
        };
        self.table
            .entry(key)
            .or_insert_with(TraceAggregate::default)
            .fold(&summary);
    }

    /// Remove and return every (trace_id, aggregate) whose window has
    /// fully elapsed as of `now`.
    pub fn close_elapsed(&self, now: DateTime<Utc>) -> Vec<(String, TraceAggregate)> {
        let closeable: Vec<WindowKey> = self
            .table
            .iter()
            .filter(|entry| entry.key().window_start + self.window_len <= now)
            .map(|entry| entry.key().clone())
            .collect();

        closeable
            .into_iter()
            .filter_map(|key| {
                self.table
                    .remove(&key)
                    .map(|(k, agg)| (k.trace_id, agg))
            })
            .collect()
    }
}
