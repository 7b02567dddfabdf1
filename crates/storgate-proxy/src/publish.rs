//! Appending serialized events to per-target delivery queues

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{ProxyError, Result};
use crate::event::Event;
use crate::rules::TargetId;

/// Shared delivery store holding one append-only list per target queue.
pub trait DeliveryStore: Send + Sync {
    /// Appends a value to the list under `list_key`.
    fn append(&self, list_key: &str, value: &[u8]) -> Result<()>;
}

/// In-process delivery store.
pub struct MemoryDeliveryStore {
    queues: RwLock<HashMap<String, Vec<Vec<u8>>>>,
}

impl MemoryDeliveryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// The queued values for a target, oldest first.
    pub fn queue(&self, list_key: &str) -> Vec<Vec<u8>> {
        match self.queues.read() {
            Ok(queues) => queues.get(list_key).cloned().unwrap_or_default(),
            Err(_) => vec![],
        }
    }

    /// The number of values queued under `list_key`.
    pub fn queue_len(&self, list_key: &str) -> usize {
        match self.queues.read() {
            Ok(queues) => queues.get(list_key).map(|q| q.len()).unwrap_or(0),
            Err(_) => 0,
        }
    }
}

impl Default for MemoryDeliveryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryStore for MemoryDeliveryStore {
    fn append(&self, list_key: &str, value: &[u8]) -> Result<()> {
        let mut queues = self.queues.write().map_err(|_| ProxyError::Backend {
            reason: "delivery store lock poisoned".to_string(),
        })?;
        queues
            .entry(list_key.to_string())
            .or_default()
            .push(value.to_vec());
        Ok(())
    }
}

/// Publishes events to per-target ordered queues. Delivery is
/// at-least-once: no deduplication, no acknowledgment, no backpressure.
pub struct TargetQueuePublisher {
    store: Arc<dyn DeliveryStore>,
}

impl TargetQueuePublisher {
    /// Creates a publisher over the given delivery store.
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Serializes the event and appends it to the target's queue. The
    /// append error, if any, is the error returned.
    pub fn publish(&self, target: &TargetId, event: &Event) -> Result<()> {
        let value = serde_json::to_vec(event).map_err(|err| ProxyError::PublishFailed {
            target: target.queue_key(),
            reason: format!("event serialization failed: {}", err),
        })?;

        self.store
            .append(&target.queue_key(), &value)
            .map_err(|err| ProxyError::PublishFailed {
                target: target.queue_key(),
                reason: err.to_string(),
            })
    }
}
