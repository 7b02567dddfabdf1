//! Object-storage collaborator boundary with named exclusive locks

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

use crate::error::{ProxyError, Result};

/// Whole-object storage within one named pool. Lock acquisition blocks
/// until the lock is available; release is safe to call when the lock is
/// not held.
pub trait ObjectStore: Send + Sync {
    /// Writes an object, replacing any prior content.
    fn write_full(&self, name: &str, data: &[u8]) -> Result<()>;
    /// Appends bytes to an object, creating it if absent.
    fn append(&self, name: &str, data: &[u8]) -> Result<()>;
    /// Reads an object's content; `None` if it does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;
    /// Deletes an object if present.
    fn remove(&self, name: &str) -> Result<()>;
    /// Acquires a named exclusive lock on an object, blocking until it
    /// is available. Reacquiring with the same cookie succeeds.
    fn lock_exclusive(&self, name: &str, lock: &str, cookie: &str, desc: &str) -> Result<()>;
    /// Releases a named lock. A release with a cookie that does not hold
    /// the lock is a no-op.
    fn unlock(&self, name: &str, lock: &str, cookie: &str) -> Result<()>;
}

type LockKey = (String, String);

/// In-process object store with blocking named-lock semantics.
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    locks: Mutex<HashMap<LockKey, String>>,
    lock_released: Condvar,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            lock_released: Condvar::new(),
        }
    }

    fn poisoned() -> ProxyError {
        ProxyError::Backend {
            reason: "object store lock poisoned".to_string(),
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn write_full(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        objects.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn append(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        objects
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        Ok(objects.get(name).cloned())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        objects.remove(name);
        Ok(())
    }

    fn lock_exclusive(&self, name: &str, lock: &str, cookie: &str, _desc: &str) -> Result<()> {
        let key = (name.to_string(), lock.to_string());
        let mut held = self.locks.lock().map_err(|_| Self::poisoned())?;
        loop {
            match held.get(&key) {
                None => {
                    held.insert(key, cookie.to_string());
                    return Ok(());
                }
                Some(holder) if holder == cookie => return Ok(()),
                Some(_) => {
                    held = self
                        .lock_released
                        .wait(held)
                        .map_err(|_| Self::poisoned())?;
                }
            }
        }
    }

    fn unlock(&self, name: &str, lock: &str, cookie: &str) -> Result<()> {
        let key = (name.to_string(), lock.to_string());
        let mut held = self.locks.lock().map_err(|_| Self::poisoned())?;
        if held.get(&key).map(|holder| holder == cookie) == Some(true) {
            held.remove(&key);
            self.lock_released.notify_all();
        }
        Ok(())
    }
}
