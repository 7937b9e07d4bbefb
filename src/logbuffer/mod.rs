//! Per-trace log correlation buffer and per-service redaction audit
//! counters. Both are `DashMap`-backed, shared between the logs stream and
//! the window-close consumer, grounded on the same per-shard-locked
//! registry idiom used for the scorer registry.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::log::LogRecord;

const REDACTION_MARKERS: [&str; 2] = ["[REDACTED_EMAIL]", "[REDACTED_AUTHOR]"];

struct BufferEntry {
    first_seen: DateTime<Utc>,
    logs: VecDeque<LogRecord>,
}

/// Bounded per-trace log buffer. Logs with an empty trace_id are never
/// buffered; entries beyond the per-trace cap are silently dropped.
pub struct LogBuffer {
    cap: usize,
    entries: DashMap<String, BufferEntry>,
}

impl LogBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: DashMap::new(),
        }
    }

    /// Buffer a log record under its trace_id, if non-empty and under cap.
    pub fn push(&self, log: LogRecord) {
        if log.trace_id.is_empty() {
            return;
        }
        let mut entry = self.entries.entry(log.trace_id.clone()).or_insert_with(|| BufferEntry {
            first_seen: Utc::now(),
            logs: VecDeque::new(),
        });
        if entry.logs.len() < self.cap {
            entry.logs.push_back(log);
        }
    }

    /// Remove and return the buffered logs for a trace (anomalous close).
    pub fn flush(&self, trace_id: &str) -> Option<Vec<LogRecord>> {
        self.entries
            .remove(trace_id)
            .map(|(_, entry)| entry.logs.into_iter().collect())
    }

    /// Remove the buffered logs for a trace without returning them (clean close).
    pub fn discard(&self, trace_id: &str) {
        self.entries.remove(trace_id);
    }

    /// Evict buffer entries whose oldest log predates `now - ttl`. Traces
    /// that never materialize a window close would otherwise leak memory
    /// forever; this is a permitted, not required, extension.
    pub fn sweep(&self, ttl: chrono::Duration, now: DateTime<Utc>) {
        let cutoff = now - ttl;
        self.entries.retain(|_, entry| entry.first_seen >= cutoff);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Per-service redaction audit: counts logs containing a redaction marker,
/// emitting a `redaction_count` metric every Nth increment.
pub struct RedactionCounters {
    emit_every: u64,
    counts: DashMap<String, u64>,
}

impl RedactionCounters {
    pub fn new(emit_every: u64) -> Self {
        Self {
            emit_every,
            counts: DashMap::new(),
        }
    }

    fn has_marker(body: &str) -> bool {
        REDACTION_MARKERS.iter().any(|marker| body.contains(marker))
    }

    /// Inspect a log body; if it carries a redaction marker, increment the
    /// per-service counter and return the new value when it falls on the
    /// emit cadence, otherwise `None`.
    pub fn observe(&self, service_name: &str, body: &str) -> Option<u64> {
        if !Self::has_marker(body) {
            return None;
        }
        let mut count = self.counts.entry(service_name.to_string()).or_insert(0);
        *count += 1;
        if *count % self.emit_every == 0 {
            Some(*count)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(trace_id: &str, body: &str) -> LogRecord {
        LogRecord {
            trace_id: trace_id.to_string(),
            span_id: "s".to_string(),
            service_name: "quote".to_string(),
            body: body.to_string(),
            severity: "INFO".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn flush_returns_and_removes_entry() {
        let buf = LogBuffer::new(50);
        buf.push(log("t1", "hello"));
        buf.push(log("t1", "world"));
        let flushed = buf.flush("t1").unwrap();
        assert_eq!(flushed.len(), 2);
        assert!(buf.flush("t1").is_none());
    }

    #[test]
    fn discard_removes_without_returning() {
        let buf = LogBuffer::new(50);
        buf.push(log("t1", "hello"));
        buf.discard("t1");
        assert!(buf.flush("t1").is_none());
    }

    #[test]
    fn entries_beyond_cap_are_dropped() {
        let buf = LogBuffer::new(2);
        buf.push(log("t1", "a"));
        buf.push(log("t1", "b"));
        buf.push(log("t1", "c"));
        assert_eq!(buf.flush("t1").unwrap().len(), 2);
    }

    #[test]
    fn empty_trace_id_is_never_buffered() {
        let buf = LogBuffer::new(50);
        buf.push(log("", "hello"));
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn redaction_counter_emits_every_fifth_increment() {
        let counters = RedactionCounters::new(5);
        let mut emitted = Vec::new();
        for _ in 0..12 {
            if let Some(v) = counters.observe("quote", "leaked [REDACTED_EMAIL] field") {
                emitted.push(v);
            }
        }
        assert_eq!(emitted, vec![5, 10]);
    }

    #[test]
    fn redaction_counter_ignores_clean_bodies() {
        let counters = RedactionCounters::new(5);
        assert!(counters.observe("quote", "all clear").is_none());
    }
}
