//! Storage DAO: a capability-set trait with a default embedded-relational
//! backing store, leaving room for a remote backend without touching the
//! dataflow or the API handlers. Grounded on the teacher's `IncidentStore`
//! trait + `state::factory::create_store` dispatch.

mod sqlite_store;

pub use sqlite_store::SqliteStore;

use async_trait::async_trait;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use crate::models::alert::Alert;
use crate::models::metric::MetricSample;
use crate::models::trace::TraceInventory;

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn save_alert(&self, alert: &Alert) -> Result<()>;

    /// List recent alerts, newest first. `service` is ignored when absent
    /// or equal to the sentinel "All Services".
    async fn list_alerts(&self, service: Option<&str>, limit: i64) -> Result<Vec<Alert>>;

    async fn save_metric(&self, metric: &MetricSample) -> Result<()>;

    /// List recent samples for a metric_type, ascending by id (oldest
    /// first) so the newest sample is last for chart consumption. `service`
    /// is ignored when equal to the sentinel "All Services".
    async fn list_metrics(
        &self,
        service: &str,
        metric_type: &str,
        limit: i64,
    ) -> Result<Vec<MetricSample>>;

    /// Upsert a trace-inventory record.
    async fn save_trace(&self, trace: &TraceInventory) -> Result<()>;

    async fn get_trace_by_id(&self, trace_id: &str) -> Result<Option<TraceInventory>>;
}

/// The sentinel value meaning "do not filter by service".
pub const ALL_SERVICES: &str = "All Services";

/// Create the configured storage backend.
pub async fn create_store(config: &StorageConfig) -> Result<std::sync::Arc<dyn TelemetryStore>> {
    match config.backend {
        StorageBackend::Sqlite => {
            tracing::info!(path = %config.path, "initializing sqlite storage backend");
            let store = SqliteStore::new(&config.path).await?;
            Ok(std::sync::Arc::new(store))
        }
    }
}
