use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the query/ingest API router, including the operator WebSocket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/alerts", post(handlers::ingest_alert))
        .route("/api/alerts", get(handlers::list_alerts))
        .route("/api/metrics", post(handlers::ingest_metric))
        .route("/api/metrics/:service/:metric_type", get(handlers::list_metrics))
        .route("/api/traces", post(handlers::ingest_trace))
        .route("/api/traces/:trace_id", get(handlers::get_trace))
        .route("/api/logs", post(handlers::ingest_log))
        .route("/api/rca/:trace_id", post(handlers::rca))
        .route("/ws", get(handlers::websocket_handler))
        .route("/metrics", get(handlers::metrics_export))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
