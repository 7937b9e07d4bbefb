use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::{AppError, Result};
use crate::models::alert::Alert;
use crate::models::metric::MetricSample;
use crate::models::trace::{SpanSummary, TraceInventory};

use async_trait::async_trait;

use super::{TelemetryStore, ALL_SERVICES};

/// Embedded relational store backed by SQLite, the async-SQL equivalent of
/// the original's `aiosqlite`-backed `SQLiteStorage`. Each handler opens its
/// own checkout from a bounded pool rather than sharing a single
/// connection — acceptable per the concurrency contract.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(path: &str) -> Result<Self> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .map_err(|e| AppError::Database(format!("failed to open sqlite store: {e}")))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service TEXT NOT NULL,
                route TEXT NOT NULL,
                anomaly_score REAL NOT NULL,
                is_anomaly BOOLEAN NOT NULL,
                duration_ms REAL NOT NULL,
                trace_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                spans_json TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service TEXT NOT NULL,
                metric_type TEXT NOT NULL,
                value REAL NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trace_inventory (
                trace_id TEXT PRIMARY KEY,
                duration_ms REAL NOT NULL,
                spans_json TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_alert(row: &sqlx::sqlite::SqliteRow) -> Result<Alert> {
        let spans_json: String = row.try_get("spans_json")?;
        let spans: Vec<SpanSummary> = serde_json::from_str(&spans_json)?;
        Ok(Alert {
            id: Some(row.try_get("id")?),
            service: row.try_get("service")?,
            route: row.try_get("route")?,
            anomaly_score: row.try_get("anomaly_score")?,
            is_anomaly: row.try_get("is_anomaly")?,
            duration_ms: row.try_get("duration_ms")?,
            trace_id: row.try_get("trace_id")?,
            timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
            spans,
        })
    }

    fn row_to_metric(row: &sqlx::sqlite::SqliteRow) -> Result<MetricSample> {
        let metric_type_str: String = row.try_get("metric_type")?;
        let metric_type = metric_type_str
            .parse()
            .map_err(|e: String| AppError::Database(e))?;
        Ok(MetricSample {
            id: Some(row.try_get("id")?),
            service: row.try_get("service")?,
            metric_type,
            value: row.try_get("value")?,
            timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        })
    }
}

#[async_trait]
impl TelemetryStore for SqliteStore {
    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        let spans_json = serde_json::to_string(&alert.spans)?;
        sqlx::query(
            "INSERT INTO alerts (service, route, anomaly_score, is_anomaly, duration_ms, trace_id, timestamp, spans_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.service)
        .bind(&alert.route)
        .bind(alert.anomaly_score)
        .bind(alert.is_anomaly)
        .bind(alert.duration_ms)
        .bind(&alert.trace_id)
        .bind(alert.timestamp)
        .bind(spans_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_alerts(&self, service: Option<&str>, limit: i64) -> Result<Vec<Alert>> {
        let filter_service = service.filter(|s| *s != ALL_SERVICES);

        let rows = if let Some(svc) = filter_service {
            sqlx::query("SELECT * FROM alerts WHERE service = ? ORDER BY id DESC LIMIT ?")
                .bind(svc)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM alerts ORDER BY id DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(Self::row_to_alert).collect()
    }

    async fn save_metric(&self, metric: &MetricSample) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics (service, metric_type, value, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(&metric.service)
        .bind(metric.metric_type.as_str())
        .bind(metric.value)
        .bind(metric.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_metrics(
        &self,
        service: &str,
        metric_type: &str,
        limit: i64,
    ) -> Result<Vec<MetricSample>> {
        let rows = if service == ALL_SERVICES {
            sqlx::query(
                "SELECT * FROM metrics WHERE metric_type = ? ORDER BY id DESC LIMIT ?",
            )
            .bind(metric_type)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT * FROM metrics WHERE service = ? AND metric_type = ? ORDER BY id DESC LIMIT ?",
            )
            .bind(service)
            .bind(metric_type)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        let mut samples: Vec<MetricSample> =
            rows.iter().map(Self::row_to_metric).collect::<Result<_>>()?;
        samples.reverse();
        Ok(samples)
    }

    async fn save_trace(&self, trace: &TraceInventory) -> Result<()> {
        let spans_json = serde_json::to_string(&trace.spans)?;
        sqlx::query(
            "INSERT INTO trace_inventory (trace_id, duration_ms, spans_json, timestamp)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(trace_id) DO UPDATE SET
                duration_ms = excluded.duration_ms,
                spans_json = excluded.spans_json,
                timestamp = excluded.timestamp",
        )
        .bind(&trace.trace_id)
        .bind(trace.duration_ms)
        .bind(spans_json)
        .bind(trace.ingest_timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_trace_by_id(&self, trace_id: &str) -> Result<Option<TraceInventory>> {
        let row = sqlx::query("SELECT * FROM trace_inventory WHERE trace_id = ?")
            .bind(trace_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let spans_json: String = row.try_get("spans_json")?;
        let spans: Vec<SpanSummary> = serde_json::from_str(&spans_json)?;

        Ok(Some(TraceInventory {
            trace_id: row.try_get("trace_id")?,
            duration_ms: row.try_get("duration_ms")?,
            spans,
            ingest_timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn temp_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    fn alert(service: &str) -> Alert {
        Alert {
            id: None,
            service: service.to_string(),
            route: "/quote".to_string(),
            anomaly_score: 1.0,
            is_anomaly: true,
            duration_ms: 800.0,
            trace_id: "t1".to_string(),
            timestamp: Utc::now(),
            spans: vec![],
        }
    }

    #[tokio::test]
    async fn alerts_list_in_descending_id_order() {
        let (store, _dir) = temp_store().await;
        store.save_alert(&alert("quote")).await.unwrap();
        store.save_alert(&alert("quote")).await.unwrap();
        let alerts = store.list_alerts(None, 50).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].id.unwrap() > alerts[1].id.unwrap());
    }

    #[tokio::test]
    async fn metrics_list_in_ascending_id_order() {
        let (store, _dir) = temp_store().await;
        for v in [1.0, 2.0, 3.0] {
            store
                .save_metric(&MetricSample {
                    id: None,
                    service: "quote".to_string(),
                    metric_type: crate::models::metric::MetricType::Throughput,
                    value: v,
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }
        let samples = store.list_metrics("quote", "throughput", 60).await.unwrap();
        assert_eq!(samples.iter().map(|s| s.value).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn trace_upsert_replaces_existing_record() {
        let (store, _dir) = temp_store().await;
        let mut inv = TraceInventory {
            trace_id: "t1".to_string(),
            duration_ms: 100.0,
            spans: vec![],
            ingest_timestamp: Utc::now(),
        };
        store.save_trace(&inv).await.unwrap();
        inv.duration_ms = 500.0;
        store.save_trace(&inv).await.unwrap();
        let fetched = store.get_trace_by_id("t1").await.unwrap().unwrap();
        assert_eq!(fetched.duration_ms, 500.0);
    }

    #[tokio::test]
    async fn missing_trace_returns_none() {
        let (store, _dir) = temp_store().await;
        assert!(store.get_trace_by_id("nope").await.unwrap().is_none());
    }
}
