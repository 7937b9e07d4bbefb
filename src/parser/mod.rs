//! Defensive OTLP JSON parsing. Non-OTLP-shaped payloads yield an empty
//! sequence rather than an error; every nested lookup defaults instead of
//! panicking or propagating, mirroring the original `telemetry_parser.py`.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::span::ScoredSpan;
use crate::models::log::LogRecord;

fn extract_attr(attributes: &Value, key: &str) -> Option<String> {
    attributes.as_array()?.iter().find_map(|attr| {
        if attr.get("key")?.as_str()? != key {
            return None;
        }
        attr.get("value")?.get("stringValue")?.as_str().map(str::to_string)
    })
}

fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    let secs = (nanos / 1_000_000_000) as i64;
    let sub_nanos = (nanos % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, sub_nanos).unwrap_or_else(Utc::now)
}

fn value_as_u64(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    v.as_str()?.parse::<u64>().ok()
}

/// Walk `resourceSpans` -> `scopeSpans` -> `spans`, lifting `service.name`
/// from the resource and `http.route` (falling back to the span name) from
/// the span. Unscored: `anomaly_score` and `is_anomaly` are left at their
/// zero defaults for the scorer stage to fill in.
pub fn parse_trace_payload(payload: &Value) -> Vec<ScoredSpan> {
    let mut out = Vec::new();

    let Some(resource_spans) = payload.get("resourceSpans").and_then(Value::as_array) else {
        return out;
    };

    for resource_span in resource_spans {
        let service_name = resource_span
            .get("resource")
            .and_then(|r| r.get("attributes"))
            .and_then(|attrs| extract_attr(attrs, "service.name"))
            .unwrap_or_else(|| "unknown".to_string());

        let Some(scope_spans) = resource_span.get("scopeSpans").and_then(Value::as_array) else {
            continue;
        };

        for scope_span in scope_spans {
            let Some(spans) = scope_span.get("spans").and_then(Value::as_array) else {
                continue;
            };

            for span in spans {
                let trace_id = span
                    .get("traceId")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let span_id = span
                    .get("spanId")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let parent_span_id = span
                    .get("parentSpanId")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                let span_name = span
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let route = span
                    .get("attributes")
                    .and_then(|attrs| extract_attr(attrs, "http.route"))
                    .unwrap_or_else(|| span_name.clone());

                let start_nanos = span
                    .get("startTimeUnixNano")
                    .and_then(value_as_u64);
                let end_nanos = span.get("endTimeUnixNano").and_then(value_as_u64);

                let duration_ms = match (start_nanos, end_nanos) {
                    (Some(start), Some(end)) if end >= start => {
                        (end - start) as f64 / 1_000_000.0
                    }
                    _ => 0.0,
                };

                let start_time = start_nanos.map(nanos_to_datetime).unwrap_or_else(Utc::now);

                let status_code = span
                    .get("status")
                    .and_then(|s| s.get("code"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0);

                out.push(ScoredSpan {
                    trace_id,
                    span_id,
                    parent_span_id,
                    service_name: service_name.clone(),
                    span_name,
                    route,
                    duration_ms,
                    start_time,
                    status_code,
                    anomaly_score: 0.0,
                    is_anomaly: false,
                });
            }
        }
    }

    out
}

/// Walk `resourceLogs` -> `scopeLogs` -> `logRecords`.
pub fn parse_log_payload(payload: &Value) -> Vec<LogRecord> {
    let mut out = Vec::new();

    let Some(resource_logs) = payload.get("resourceLogs").and_then(Value::as_array) else {
        return out;
    };

    for resource_log in resource_logs {
        let service_name = resource_log
            .get("resource")
            .and_then(|r| r.get("attributes"))
            .and_then(|attrs| extract_attr(attrs, "service.name"))
            .unwrap_or_else(|| "unknown".to_string());

        let Some(scope_logs) = resource_log.get("scopeLogs").and_then(Value::as_array) else {
            continue;
        };

        for scope_log in scope_logs {
            let Some(log_records) = scope_log.get("logRecords").and_then(Value::as_array) else {
                continue;
            };

            for record in log_records {
                let trace_id = record
                    .get("traceId")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let span_id = record
                    .get("spanId")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let body = record
                    .get("body")
                    .and_then(|b| b.get("stringValue"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let severity = record
                    .get("severityText")
                    .and_then(Value::as_str)
                    .unwrap_or("INFO")
                    .to_string();
                let timestamp = record
                    .get("timeUnixNano")
                    .and_then(value_as_u64)
                    .map(nanos_to_datetime)
                    .unwrap_or_else(Utc::now);

                out.push(LogRecord {
                    trace_id,
                    span_id,
                    service_name: service_name.clone(),
                    body,
                    severity,
                    timestamp,
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_otlp_shape_yields_empty() {
        assert!(parse_trace_payload(&json!({"nonsense": true})).is_empty());
        assert!(parse_log_payload(&json!({"nonsense": true})).is_empty());
    }

    #[test]
    fn parses_a_single_span_and_computes_duration() {
        let payload = json!({
            "resourceSpans": [{
                "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "quote"}}]},
                "scopeSpans": [{
                    "spans": [{
                        "traceId": "abc123",
                        "spanId": "s1",
                        "name": "GET /quote",
                        "startTimeUnixNano": "1000000000",
                        "endTimeUnixNano": "1100000000",
                        "status": {"code": 2}
                    }]
                }]
            }]
        });
        let spans = parse_trace_payload(&payload);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].trace_id, "abc123");
        assert_eq!(spans[0].service_name, "quote");
        assert_eq!(spans[0].route, "GET /quote");
        assert_eq!(spans[0].duration_ms, 100.0);
        assert_eq!(spans[0].status_code, 2);
    }

    #[test]
    fn http_route_attribute_overrides_span_name_fallback() {
        let payload = json!({
            "resourceSpans": [{
                "resource": {"attributes": []},
                "scopeSpans": [{
                    "spans": [{
                        "traceId": "t1",
                        "name": "handler",
                        "attributes": [{"key": "http.route", "value": {"stringValue": "/v1/quote"}}]
                    }]
                }]
            }]
        });
        let spans = parse_trace_payload(&payload);
        assert_eq!(spans[0].route, "/v1/quote");
    }

    #[test]
    fn parses_logs_with_defaults() {
        let payload = json!({
            "resourceLogs": [{
                "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "quote"}}]},
                "scopeLogs": [{
                    "logRecords": [{"traceId": "t1", "body": {"stringValue": "hello"}}]
                }]
            }]
        });
        let logs = parse_log_payload(&payload);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].severity, "INFO");
        assert_eq!(logs[0].body, "hello");
    }
}
