use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::broadcast::ServerEvent;
use crate::error::{AppError, Result};
use crate::models::alert::Alert;
use crate::models::metric::MetricSample;
use crate::models::trace::{SpanSummary, TraceInventory};
use crate::storage::ALL_SERVICES;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn metrics_export() -> impl IntoResponse {
    crate::metrics::export()
}

pub async fn ingest_alert(
    State(state): State<AppState>,
    Json(alert): Json<Alert>,
) -> Result<impl IntoResponse> {
    state.store.save_alert(&alert).await?;
    state.hub.publish(ServerEvent::NewAnomaly(alert));
    Ok(Json(json!({"status": "accepted"})))
}

#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    pub service: Option<String>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Result<impl IntoResponse> {
    let alerts = state
        .store
        .list_alerts(query.service.as_deref(), 50)
        .await?;
    Ok(Json(alerts))
}

pub async fn ingest_metric(
    State(state): State<AppState>,
    Json(metric): Json<MetricSample>,
) -> Result<impl IntoResponse> {
    state.store.save_metric(&metric).await?;
    state.hub.publish(ServerEvent::MetricUpdate(metric));
    Ok(Json(json!({"status": "accepted"})))
}

pub async fn list_metrics(
    State(state): State<AppState>,
    Path((service, metric_type)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let service = if service.is_empty() { ALL_SERVICES.to_string() } else { service };
    let samples = state.store.list_metrics(&service, &metric_type, 60).await?;
    Ok(Json(samples))
}

#[derive(Debug, Deserialize)]
pub struct TraceIngestRequest {
    pub trace_id: String,
    pub duration_ms: f64,
    #[serde(default)]
    pub spans: Vec<SpanSummary>,
}

pub async fn ingest_trace(
    State(state): State<AppState>,
    Json(req): Json<TraceIngestRequest>,
) -> Result<impl IntoResponse> {
    let inventory = TraceInventory {
        trace_id: req.trace_id,
        duration_ms: req.duration_ms,
        spans: req.spans,
        ingest_timestamp: Utc::now(),
    };
    state.store.save_trace(&inventory).await?;
    Ok(Json(json!({"status": "accepted"})))
}

pub async fn get_trace(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
) -> Result<impl IntoResponse> {
    let trace = state
        .store
        .get_trace_by_id(&trace_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Trace not found".to_string()))?;
    Ok(Json(trace))
}

/// Ingest a correlated log. Accepted best-effort: there is no persisted
/// log table, so a well-formed body is simply acknowledged.
pub async fn ingest_log(Json(_log): Json<crate::models::log::LogRecord>) -> impl IntoResponse {
    Json(json!({"status": "accepted"}))
}

pub async fn rca(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
    Json(context): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    if !state.rca.is_configured() {
        return Err(AppError::ExternalServiceUnavailable(
            "Gemini API not configured".to_string(),
        ));
    }
    let report = state.rca.analyze(&trace_id, &context).await;
    Ok(Json(report))
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let history = state
        .store
        .list_alerts(None, 20)
        .await
        .unwrap_or_default();

    let history_frame = serde_json::to_string(&ServerEvent::History(history))
        .expect("ServerEvent always serializes");
    if sender.send(Message::Text(history_frame)).await.is_err() {
        return;
    }

    let (id, mut rx) = state.hub.subscribe();
    let hub = Arc::clone(&state.hub);

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {
            // push-only channel: inbound client frames are discarded
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unsubscribe(id);
}
