//! Cached persistence of per-bucket subscription configuration

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::error::{ProxyError, Result};
use crate::rules::BucketNotificationConfig;

/// Keyed cache the subscription documents are persisted in. No TTL;
/// concurrent writers race and the last serialized write wins.
pub trait ConfigCache: Send + Sync {
    /// Looks up a value; `None` means the key is absent.
    fn get(&self, key: &str) -> Option<String>;
    /// Stores a value, overwriting any prior one.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process cache backend.
pub struct MemoryConfigCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryConfigCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryConfigCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigCache for MemoryConfigCache {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().ok()?;
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| ProxyError::Backend {
            reason: "config cache lock poisoned".to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store of per-bucket notification configuration over an injected cache.
pub struct NotificationConfigStore {
    cache: Arc<dyn ConfigCache>,
}

impl NotificationConfigStore {
    /// Creates a store over the given cache backend.
    pub fn new(cache: Arc<dyn ConfigCache>) -> Self {
        Self { cache }
    }

    fn cache_key(bucket: &str) -> String {
        format!("config:{}", bucket)
    }

    /// Loads the bucket's configuration. `Ok(None)` means no
    /// notifications are configured; an unparseable stored document is
    /// logged and treated the same way.
    pub fn get(&self, bucket: &str) -> Result<Option<BucketNotificationConfig>> {
        let raw = match self.cache.get(&Self::cache_key(bucket)) {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match serde_json::from_str(&raw) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                warn!(
                    "discarding unparseable notification document for bucket {}: {}",
                    bucket, err
                );
                Ok(None)
            }
        }
    }

    /// Serializes and stores the bucket's configuration, overwriting any
    /// prior document unconditionally. No optimistic concurrency; the
    /// last successful write wins.
    pub fn put(&self, bucket: &str, config: &BucketNotificationConfig) -> Result<()> {
        let raw = serde_json::to_string(config).map_err(|err| ProxyError::MalformedDocument {
            reason: err.to_string(),
        })?;
        self.cache.set(&Self::cache_key(bucket), &raw)
    }
}
