//! In-process session channel for tests and single-process runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{BusError, BusEvent, EventBus, EventHandler, EventKind, Subscription};

#[derive(Default)]
struct Registry {
    subscribers: HashMap<String, Vec<(u64, EventHandler)>>,
    next_id: u64,
    published: u64,
}

/// In-memory pub/sub with configurable delivery delay and loss.
///
/// Without a delay, handlers run synchronously inside `publish`. With a
/// delay, each event is delivered from a spawned tokio task, so publishing
/// then requires a running runtime and delivery order across events is not
/// guaranteed.
#[derive(Clone, Default)]
pub struct MemoryBus {
    registry: Arc<Mutex<Registry>>,
    delay: Option<Duration>,
    drop_every: Option<u64>,
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("delay", &self.delay)
            .field("drop_every", &self.drop_every)
            .finish_non_exhaustive()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every event after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Silently lose every `n`th published event (1-based).
    pub fn with_drop_every(mut self, n: u64) -> Self {
        self.drop_every = (n > 0).then_some(n);
        self
    }

    /// Number of handlers currently attached to `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .get(channel)
            .map_or(0, Vec::len)
    }
}

impl EventBus for MemoryBus {
    fn publish(
        &self,
        channel: &str,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        let (handlers, lost) = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.published += 1;
            let lost = self
                .drop_every
                .is_some_and(|n| registry.published % n == 0);
            let handlers: Vec<EventHandler> = registry
                .subscribers
                .get(channel)
                .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default();
            (handlers, lost)
        };

        if lost {
            log::debug!("MemoryBus dropped {} event on {}", kind, channel);
            return Ok(());
        }

        let event = BusEvent {
            channel: channel.to_string(),
            kind,
            payload,
        };

        match self.delay {
            None => {
                for handler in &handlers {
                    handler(&event);
                }
            }
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for handler in &handlers {
                        handler(&event);
                    }
                });
            }
        }
        Ok(())
    }

    fn subscribe(&self, channel: &str, handler: EventHandler) -> Subscription {
        let id = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .subscribers
                .entry(channel.to_string())
                .or_default()
                .push((id, handler));
            id
        };

        let registry = Arc::clone(&self.registry);
        let channel = channel.to_string();
        Subscription::new(move || {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(subs) = registry.subscribers.get_mut(&channel) {
                subs.retain(|(sub_id, _)| *sub_id != id);
                if subs.is_empty() {
                    registry.subscribers.remove(&channel);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collector() -> (EventHandler, Arc<Mutex<Vec<BusEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: EventHandler = Arc::new(move |ev: &BusEvent| {
            sink.lock().unwrap().push(ev.clone());
        });
        (handler, seen)
    }

    #[test]
    fn test_synchronous_delivery() {
        let bus = MemoryBus::new();
        let (handler, seen) = collector();
        let _sub = bus.subscribe("sess-a", handler);

        bus.publish("sess-a", EventKind::Shot, json!({"jobId": "12345678"}))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, EventKind::Shot);
        assert_eq!(seen[0].payload["jobId"], "12345678");
    }

    #[test]
    fn test_channels_are_isolated() {
        let bus = MemoryBus::new();
        let (handler, seen) = collector();
        let _sub = bus.subscribe("sess-a", handler);

        bus.publish("sess-b", EventKind::Answer, json!({})).unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = MemoryBus::new();
        let (handler, seen) = collector();
        let sub = bus.subscribe("sess-a", handler);
        assert_eq!(bus.subscriber_count("sess-a"), 1);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count("sess-a"), 0);

        bus.publish("sess-a", EventKind::Shot, json!({})).unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_drop_every_loses_events() {
        let bus = MemoryBus::new().with_drop_every(2);
        let (handler, seen) = collector();
        let _sub = bus.subscribe("sess-a", handler);

        for i in 0..4 {
            bus.publish("sess-a", EventKind::Shot, json!({ "n": i })).unwrap();
        }

        let seen = seen.lock().unwrap();
        let delivered: Vec<i64> = seen.iter().map(|e| e.payload["n"].as_i64().unwrap()).collect();
        assert_eq!(delivered, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_delayed_delivery() {
        let bus = MemoryBus::new().with_delay(Duration::from_millis(20));
        let (handler, seen) = collector();
        let _sub = bus.subscribe("sess-a", handler);

        bus.publish("sess-a", EventKind::Answer, json!({})).unwrap();
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_handler_may_publish_reentrantly() {
        let bus = MemoryBus::new();
        let (handler, seen) = collector();
        let _sink = bus.subscribe("sess-b", handler);

        let inner = bus.clone();
        let _relay = bus.subscribe(
            "sess-a",
            Arc::new(move |ev: &BusEvent| {
                inner
                    .publish("sess-b", ev.kind, ev.payload.clone())
                    .unwrap();
            }),
        );

        bus.publish("sess-a", EventKind::Shot, json!({"x": 1})).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
