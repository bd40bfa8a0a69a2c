//! Session channel abstraction.
//!
//! Shot and answer notifications travel over an at-least-once, unordered
//! pub/sub channel named after the session. The transport is injected as an
//! [`EventBus`] so the dispatcher and correlator never depend on a live
//! network:
//! - [`MemoryBus`] delivers in-process, optionally delayed or lossy
//! - [`NullBus`] stands in when no transport is configured
//! - [`RelayBus`] talks to a `quizcam relay` over TCP

mod memory;
mod null;
mod relay;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryBus;
pub use null::NullBus;
pub use relay::{serve as serve_relay, RelayBus, RelayFrame, DEFAULT_RELAY_ADDR, MAX_FRAME_LEN};

/// Kinds of notification carried on a session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A job was captured and queued
    Shot,
    /// A job was scored
    Answer,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Shot => "shot",
            EventKind::Answer => "answer",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub channel: String,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

/// Callback invoked for every event delivered on a subscribed channel.
pub type EventHandler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Channel name for a session.
pub fn session_channel(session: &Uuid) -> String {
    format!("sess-{}", session)
}

/// Errors surfaced by a transport when publishing.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Realtime transport not configured")]
    Unavailable,

    #[error("Realtime transport closed")]
    Closed,

    #[error("Failed to connect to relay at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Injected publish/subscribe capability.
pub trait EventBus: Send + Sync {
    /// Publish `payload` as a `kind` event on `channel`.
    fn publish(
        &self,
        channel: &str,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<(), BusError>;

    /// Register `handler` for every event on `channel` until the returned
    /// subscription is dropped or unsubscribed.
    fn subscribe(&self, channel: &str, handler: EventHandler) -> Subscription;
}

/// Handle that detaches a handler when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to detach.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
