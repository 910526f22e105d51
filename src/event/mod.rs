//! In-process event bus for resume notifications.
//!
//! Topic-based publish/subscribe: best-effort delivery to all subscribers of a topic
//! in registration order; not durable. Publishing to an unknown topic is a no-op.

use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Callback invoked with the event payload when its topic is published.
pub type EventCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Event bus trait for publishing and subscribing to events.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic. Unknown topics are a no-op, not an error.
    async fn publish(&self, topic: &str, payload: Value) -> Result<()>;

    /// Register a callback invoked on every publish to `topic`.
    async fn subscribe(&self, topic: &str, callback: EventCallback) -> Result<()>;

    /// Remove all subscriptions for `topic`.
    async fn unsubscribe(&self, topic: &str) -> Result<()>;
}

/// In-process event bus backed by tokio broadcast channels and a callback registry.
pub struct InProcEventBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Value>>>>,
    callbacks: Arc<RwLock<HashMap<String, Vec<EventCallback>>>>,
}

impl InProcEventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            callbacks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InProcEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InProcEventBus {
    async fn publish(&self, topic: &str, payload: Value) -> Result<()> {
        let sender = {
            let mut channels = self.channels.write();
            channels
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(100).0)
                .clone()
        };

        // Ignore send errors: no receivers is a normal case, not a failure.
        let _ = sender.send(payload.clone());

        if let Some(callbacks) = self.callbacks.read().get(topic) {
            for callback in callbacks {
                callback(payload.clone());
            }
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str, callback: EventCallback) -> Result<()> {
        self.callbacks
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(callback);
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.callbacks.write().remove(topic);
        self.channels.write().remove(topic);
        Ok(())
    }
}

#[cfg(test)]
mod event_test;
