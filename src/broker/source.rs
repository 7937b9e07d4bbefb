use std::time::Duration;

use futures::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
    Connection, ConnectionProperties, Consumer,
};

use crate::config::BrokerConfig;
use crate::error::PipelineError;

use super::BackoffClock;

/// A dynamic source yielding decoded JSON payloads pulled from a RabbitMQ
/// stream queue. Declares the queue durable with `x-queue-type: stream`,
/// consumes from offset "first" with manual ack and a small prefetch, and
/// reconnects under an exponential backoff clock on connection loss.
pub struct BrokerSource {
    config: BrokerConfig,
    backoff: BackoffClock,
    consumer: Option<Consumer>,
    _connection: Option<Connection>,
}

impl BrokerSource {
    pub fn new(config: BrokerConfig) -> Self {
        let backoff = BackoffClock::new(
            Duration::from_secs(config.backoff_floor_secs),
            Duration::from_secs(config.backoff_ceiling_secs),
        );
        Self {
            config,
            backoff,
            consumer: None,
            _connection: None,
        }
    }

    fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/%2f",
            self.config.user, self.config.password, self.config.host, self.config.port
        )
    }

    /// Establish (or re-establish) the connection, channel, queue
    /// declaration, and consumer. On failure, records a backoff step and
    /// surfaces `PipelineError::TransientBroker` so the caller can sleep and
    /// retry.
    async fn connect(&mut self) -> Result<(), PipelineError> {
        let props = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let conn = Connection::connect(&self.amqp_uri(), props)
            .await
            .map_err(|e| PipelineError::TransientBroker(e.to_string()))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| PipelineError::TransientBroker(e.to_string()))?;

        let mut declare_args = FieldTable::default();
        declare_args.insert("x-queue-type".into(), AMQPValue::LongString("stream".into()));

        channel
            .queue_declare(
                &self.config.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                declare_args,
            )
            .await
            .map_err(|e| PipelineError::TransientBroker(e.to_string()))?;

        channel
            .basic_qos(self.config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| PipelineError::TransientBroker(e.to_string()))?;

        let mut consume_args = FieldTable::default();
        consume_args.insert(
            "x-stream-offset".into(),
            AMQPValue::LongString("first".into()),
        );

        let consumer = channel
            .basic_consume(
                &self.config.queue_name,
                "otel-stream-processor",
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                consume_args,
            )
            .await
            .map_err(|e| PipelineError::TransientBroker(e.to_string()))?;

        self.consumer = Some(consumer);
        self._connection = Some(conn);
        self.backoff.record_success();
        Ok(())
    }

    async fn ensure_connected(&mut self) -> Result<(), PipelineError> {
        if self.consumer.is_some() {
            return Ok(());
        }
        match self.connect().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.backoff.record_failure();
                tokio::time::sleep(self.backoff.current()).await;
                Err(e)
            }
        }
    }

    /// Pull the next decoded JSON payload, if any arrived within the
    /// inactivity timeout. An empty result is not an error: it means the
    /// consumer was idle, or the connection needed to be re-established, or
    /// a delivery failed to decode (logged and dropped).
    pub async fn next_batch(&mut self) -> Vec<serde_json::Value> {
        if let Err(e) = self.ensure_connected().await {
            tracing::warn!(error = %e, "broker reconnect failed, backing off");
            return Vec::new();
        }

        let consumer = match &mut self.consumer {
            Some(c) => c,
            None => return Vec::new(),
        };

        let timeout = Duration::from_millis(self.config.inactivity_timeout_ms);
        let next = match tokio::time::timeout(timeout, consumer.next()).await {
            Ok(Some(Ok(delivery))) => delivery,
            Ok(Some(Err(e))) => {
                tracing::warn!(error = %e, "broker delivery error, will reconnect");
                self.consumer = None;
                self._connection = None;
                return Vec::new();
            }
            Ok(None) => {
                tracing::warn!("broker consumer stream ended, will reconnect");
                self.consumer = None;
                self._connection = None;
                return Vec::new();
            }
            Err(_) => return Vec::new(), // inactivity timeout, no-op batch
        };

        if let Err(e) = next.ack(BasicAckOptions::default()).await {
            tracing::warn!(error = %e, "ack failed");
        }

        match serde_json::from_slice::<serde_json::Value>(&next.data) {
            Ok(value) => vec![value],
            Err(e) => {
                tracing::warn!(error = %e, "dropping message with malformed JSON body");
                Vec::new()
            }
        }
    }
}
