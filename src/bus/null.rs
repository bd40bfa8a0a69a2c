//! Transport used when no realtime collaborator is configured.

use super::{BusError, EventBus, EventHandler, EventKind, Subscription};

/// Publishing fails with [`BusError::Unavailable`]; subscribers never hear
/// anything. Callers treat both as "no remote events ever arrive".
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBus;

impl EventBus for NullBus {
    fn publish(
        &self,
        _channel: &str,
        _kind: EventKind,
        _payload: serde_json::Value,
    ) -> Result<(), BusError> {
        Err(BusError::Unavailable)
    }

    fn subscribe(&self, channel: &str, _handler: EventHandler) -> Subscription {
        log::debug!("No realtime transport; {} will stay silent", channel);
        Subscription::inert()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_publish_unavailable() {
        let result = NullBus.publish("sess-x", EventKind::Shot, serde_json::json!({}));
        assert!(matches!(result, Err(BusError::Unavailable)));
    }

    #[test]
    fn test_subscribe_is_inert() {
        let sub = NullBus.subscribe("sess-x", Arc::new(|_| panic!("never called")));
        sub.unsubscribe();
    }
}
