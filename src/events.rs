//! Per-key event fan-out. Publishers push lifecycle events onto a bounded
//! ingress channel; a dispatcher task forwards each event to every subscriber
//! registered under the same key. Subscriber queues are bounded and a full
//! queue drops the subscriber rather than backpressuring the coordinator.
//! The external transport (e.g. WebSocket) is intentionally not part of this
//! module.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const INGRESS_CAPACITY: usize = 256;
const SUBSCRIBER_CAPACITY: usize = 256;

/// One lifecycle event scoped to a key.
#[derive(Debug, Clone)]
pub struct Event {
    pub key: String,
    pub event: String,
    pub content: Vec<u8>,
}

impl Event {
    pub fn new(key: impl Into<String>, event: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            event: event.into(),
            content,
        }
    }

    /// Frame sent to subscribers: `{"event": ..., "content": ...}` where the
    /// content is embedded as JSON when it parses, else as a string.
    pub fn to_frame(&self) -> Vec<u8> {
        let content = match serde_json::from_slice::<Value>(&self.content) {
            Ok(value) => value,
            Err(_) => Value::String(String::from_utf8_lossy(&self.content).into_owned()),
        };
        serde_json::to_vec(&json!({"event": self.event, "content": content})).unwrap_or_default()
    }
}

/// A registered subscriber's receiving end. Dropping it (or falling behind)
/// unregisters the subscriber.
pub struct Subscription {
    pub id: u64,
    pub key: String,
    pub receiver: mpsc::Receiver<Vec<u8>>,
}

type SubscriberMap = Arc<Mutex<HashMap<String, HashMap<u64, mpsc::Sender<Vec<u8>>>>>>;

/// The process-wide hub. Cloning shares the same dispatcher and registry.
#[derive(Clone)]
pub struct EventHub {
    ingress: mpsc::Sender<Event>,
    subscribers: SubscriberMap,
    next_id: Arc<AtomicU64>,
}

impl EventHub {
    /// Create the hub and spawn its dispatcher. The dispatcher drains the
    /// ingress channel and exits once every publisher handle is dropped.
    pub fn new() -> Self {
        let (ingress, mut rx) = mpsc::channel::<Event>(INGRESS_CAPACITY);
        let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));

        let registry = Arc::clone(&subscribers);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let frame = event.to_frame();
                let mut map = registry.lock();
                if let Some(subs) = map.get_mut(&event.key) {
                    let mut dropped = Vec::new();
                    for (&id, sender) in subs.iter() {
                        if sender.try_send(frame.clone()).is_err() {
                            dropped.push(id);
                        }
                    }
                    for id in dropped {
                        debug!(key = %event.key, subscriber = id, "dropping slow event subscriber");
                        subs.remove(&id);
                    }
                }
            }
        });

        Self {
            ingress,
            subscribers,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue an event. Blocks briefly when the ingress channel is full;
    /// returns without error if the dispatcher has shut down.
    pub async fn publish(&self, event: Event) {
        if self.ingress.send(event).await.is_err() {
            debug!("event hub dispatcher is gone; event discarded");
        }
    }

    /// Register a subscriber for all events under `key`. Possession of the
    /// key is the only requirement.
    pub fn subscribe(&self, key: impl Into<String>) -> Subscription {
        let key = key.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers
            .lock()
            .entry(key.clone())
            .or_default()
            .insert(id, tx);
        Subscription {
            id,
            key,
            receiver: rx,
        }
    }

    pub fn unsubscribe(&self, key: &str, id: u64) {
        let mut map = self.subscribers.lock();
        if let Some(subs) = map.get_mut(key) {
            subs.remove(&id);
            if subs.is_empty() {
                map.remove(key);
            }
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.subscribers.lock().get(key).map_or(0, HashMap::len)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_same_key_subscribers_only() {
        let hub = EventHub::new();
        let mut ours = hub.subscribe("key1");
        let mut theirs = hub.subscribe("key2");

        hub.publish(Event::new("key1", "missionCreation", b"{\"i\":\"m0\"}".to_vec()))
            .await;

        let frame = ours.receiver.recv().await.unwrap();
        let value: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value["event"], "missionCreation");
        assert_eq!(value["content"]["i"], "m0");

        // the other key sees nothing
        assert!(theirs.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_json_content_becomes_string() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe("key1");
        hub.publish(Event::new("key1", "planDeleted", b"etl".to_vec()))
            .await;

        let frame = sub.receiver.recv().await.unwrap();
        let value: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value["content"], "etl");
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let hub = EventHub::new();
        let sub = hub.subscribe("key1");
        assert_eq!(hub.subscriber_count("key1"), 1);
        hub.unsubscribe("key1", sub.id);
        assert_eq!(hub.subscriber_count("key1"), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped() {
        let hub = EventHub::new();
        let sub = hub.subscribe("key1");
        // never drain the subscriber; overflow its queue
        for i in 0..(SUBSCRIBER_CAPACITY + 8) {
            hub.publish(Event::new("key1", "missionUpdate", format!("{i}").into_bytes()))
                .await;
        }
        // give the dispatcher time to run
        for _ in 0..50 {
            if hub.subscriber_count("key1") == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(hub.subscriber_count("key1"), 0);
        drop(sub);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe("key1");
        for i in 0..10 {
            hub.publish(Event::new("key1", "missionUpdate", format!("\"{i}\"").into_bytes()))
                .await;
        }
        for i in 0..10 {
            let frame = sub.receiver.recv().await.unwrap();
            let value: Value = serde_json::from_slice(&frame).unwrap();
            assert_eq!(value["content"], format!("{i}"));
        }
    }
}
