//! The HTTP/WS backend: storage DAO, broadcast hub, query/ingest API, and
//! the root-cause-analysis caller. Grounded on the teacher's `main.rs`
//! server-task + `tokio::select!` shutdown pattern.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use otel_pipeline::api::{build_router, AppState};
use otel_pipeline::broadcast::BroadcastHub;
use otel_pipeline::config::Config;
use otel_pipeline::rca::RcaClient;
use otel_pipeline::storage::create_store;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.observability.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("failed to load config ({e}), using defaults");
        toml::from_str(include_str!("../../config/default.toml")).expect("bundled default.toml is valid")
    });

    init_tracing(&config);
    otel_pipeline::metrics::init();

    let store = create_store(&config.storage).await?;
    let hub = std::sync::Arc::new(BroadcastHub::new());
    let rca = std::sync::Arc::new(RcaClient::new(&config.rca));

    let state = AppState::new(store, hub, rca);
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "starting backend");

    tokio::select! {
        result = axum::serve(listener, router.into_make_service()) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
