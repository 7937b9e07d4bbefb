//! End-to-end HTTP surface tests against the query/ingest API, driven
//! directly through the router rather than a bound socket.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use otel_pipeline::api::{build_router, AppState};
use otel_pipeline::broadcast::BroadcastHub;
use otel_pipeline::config::RcaConfig;
use otel_pipeline::rca::RcaClient;
use otel_pipeline::storage::create_store;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn test_app() -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = otel_pipeline::config::StorageConfig::default();
    storage.path = dir.path().join("test.db").to_str().unwrap().to_string();
    let store = create_store(&storage).await.unwrap();
    let hub = Arc::new(BroadcastHub::new());
    let rca = Arc::new(RcaClient::new(&RcaConfig {
        api_key_env: "OTEL_PIPE_TEST_UNSET_KEY".to_string(),
        ..RcaConfig::default()
    }));
    (build_router(AppState::new(store, hub, rca)), dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_then_list_alert_round_trips() {
    let (app, _dir) = test_app().await;

    let alert = json!({
        "service": "quote",
        "route": "/quote",
        "anomaly_score": 1.0,
        "is_anomaly": true,
        "duration_ms": 800.0,
        "trace_id": "trace-1",
        "timestamp": chrono::Utc::now(),
        "spans": [],
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/alerts")
                .header("content-type", "application/json")
                .body(Body::from(alert.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/alerts?service=quote")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let alerts = body.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["service"], "quote");
}

#[tokio::test]
async fn get_trace_404s_when_missing() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/traces/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ingest_then_get_trace_round_trips() {
    let (app, _dir) = test_app().await;

    let payload = json!({
        "trace_id": "trace-42",
        "duration_ms": 1500.0,
        "spans": [
            {"name": "quote", "service": "quote", "duration_ms": 100.0, "start_time": chrono::Utc::now(), "trace_id": "trace-42", "is_anomaly": false, "status_code": 0},
            {"name": "quote", "service": "quote", "duration_ms": 1500.0, "start_time": chrono::Utc::now(), "trace_id": "trace-42", "is_anomaly": true, "status_code": 2},
        ],
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/traces")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/traces/trace-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["trace_id"], "trace-42");
    assert_eq!(body["spans"].as_array().unwrap().len(), 2);
}

/// Scenario 6: with the RCA API key unset, RCA must 503 rather than call out.
#[tokio::test]
async fn rca_503s_when_api_key_missing() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rca/trace-1")
                .header("content-type", "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_export_is_prometheus_text() {
    otel_pipeline::metrics::init();
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
