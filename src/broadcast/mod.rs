//! Push-only broadcast hub for connected operator WebSocket subscribers.
//! Grounded on the teacher's `ConnectionManager` + `EventBroadcaster`
//! (`websocket/connection.rs`, `websocket/broadcaster.rs`), trimmed of all
//! per-session event-type filtering since this wire protocol is
//! unfiltered: every subscriber receives every event.

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::alert::Alert;
use crate::models::metric::MetricSample;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum ServerEvent {
    History(Vec<Alert>),
    NewAnomaly(Alert),
    MetricUpdate(MetricSample),
}

/// Maintains the set of active operator subscriptions. `publish` fans an
/// event out to every subscriber and removes any whose channel send fails —
/// "a subscription that fails delivery is removed from the set."
#[derive(Default)]
pub struct BroadcastHub {
    subscribers: DashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register a new subscriber, returning its id and receive half.
    pub fn subscribe(&self) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
    }

    /// Fan an event out to every subscriber, removing any whose delivery
    /// fails. DashMap's per-shard locking keeps this safe against
    /// concurrent subscribe/unsubscribe without invalidating iteration.
    pub fn publish(&self, event: ServerEvent) {
        let dead: Vec<Uuid> = self
            .subscribers
            .iter()
            .filter_map(|entry| {
                if entry.value().send(event.clone()).is_err() {
                    Some(*entry.key())
                } else {
                    None
                }
            })
            .collect();

        for id in dead {
            self.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn alert() -> Alert {
        Alert {
            id: Some(1),
            service: "quote".to_string(),
            route: "/quote".to_string(),
            anomaly_score: 1.0,
            is_anomaly: true,
            duration_ms: 800.0,
            trace_id: "t1".to_string(),
            timestamp: Utc::now(),
            spans: vec![],
        }
    }

    #[test]
    fn publish_delivers_to_all_subscribers() {
        let hub = BroadcastHub::new();
        let (_id1, mut rx1) = hub.subscribe();
        let (_id2, mut rx2) = hub.subscribe();

        hub.publish(ServerEvent::NewAnomaly(alert()));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn publish_removes_subscriber_whose_receiver_dropped() {
        let hub = BroadcastHub::new();
        let (_id, rx) = hub.subscribe();
        drop(rx);
        assert_eq!(hub.subscriber_count(), 1);
        hub.publish(ServerEvent::NewAnomaly(alert()));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_removes_entry() {
        let hub = BroadcastHub::new();
        let (id, _rx) = hub.subscribe();
        hub.unsubscribe(id);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
