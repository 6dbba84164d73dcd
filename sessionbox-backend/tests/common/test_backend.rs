//! Simple in-memory hash store implementation using DashMap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use sessionbox_backend::{BackendError, BackendResult, DeleteStatus, HashFields, HashStore};
use sessionbox_core::{SessionKey, SmolStr};

/// Simple in-memory hash store for testing using DashMap.
///
/// Cloning is cheap and clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<SessionKey, HashMap<SmolStr, String>>>,
    ttls: Arc<DashMap<SessionKey, Duration>>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw field as if another process wrote it.
    pub fn put_raw(&self, key: &str, field: &str, encoded: &str) {
        self.records
            .entry(SessionKey::new(key))
            .or_default()
            .insert(SmolStr::new(field), encoded.to_owned());
    }

    /// Read a raw field.
    pub fn get_raw(&self, key: &str, field: &str) -> Option<String> {
        self.records
            .get(key)
            .and_then(|record| record.get(field).cloned())
    }

    /// Check if a record exists.
    pub fn has(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Number of fields in a record.
    pub fn field_count(&self, key: &str) -> usize {
        self.records.get(key).map(|record| record.len()).unwrap_or(0)
    }

    /// Last time-to-live set on a record.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.ttls.get(key).map(|ttl| *ttl)
    }

    /// Calls made so far, as `"<operation> <key>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn log(&self, operation: &str, key: &SessionKey) {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("{operation} {key}"));
    }
}

#[async_trait]
impl HashStore for MemoryStore {
    async fn hash_get_all(&self, key: &SessionKey) -> BackendResult<HashFields> {
        self.log("hgetall", key);
        Ok(self
            .records
            .get(key)
            .map(|record| {
                record
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hash_set(&self, key: &SessionKey, fields: &[(SmolStr, String)]) -> BackendResult<()> {
        self.log("hset", key);
        let mut record = self.records.entry(key.clone()).or_default();
        for (name, value) in fields {
            record.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn hash_delete(&self, key: &SessionKey, fields: &[SmolStr]) -> BackendResult<u64> {
        self.log("hdel", key);
        let removed = match self.records.get_mut(key) {
            Some(mut record) => fields
                .iter()
                .filter(|name| record.remove(*name).is_some())
                .count() as u64,
            None => 0,
        };
        self.records.remove_if(key, |_, record| record.is_empty());
        Ok(removed)
    }

    async fn key_expire(&self, key: &SessionKey, ttl: Duration) -> BackendResult<bool> {
        self.log("expire", key);
        if !self.records.contains_key(key) {
            return Ok(false);
        }
        self.ttls.insert(key.clone(), ttl);
        Ok(true)
    }

    async fn key_delete(&self, key: &SessionKey) -> BackendResult<DeleteStatus> {
        self.log("del", key);
        self.ttls.remove(key);
        Ok(match self.records.remove(key) {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Store that always returns errors (for error testing).
#[derive(Clone, Default)]
pub struct ErrorStore;

fn simulated() -> BackendError {
    BackendError::ConnectionError(Box::new(std::io::Error::other("simulated error")))
}

#[async_trait]
impl HashStore for ErrorStore {
    async fn hash_get_all(&self, _key: &SessionKey) -> BackendResult<HashFields> {
        Err(simulated())
    }

    async fn hash_set(&self, _key: &SessionKey, _fields: &[(SmolStr, String)]) -> BackendResult<()> {
        Err(simulated())
    }

    async fn hash_delete(&self, _key: &SessionKey, _fields: &[SmolStr]) -> BackendResult<u64> {
        Err(simulated())
    }

    async fn key_expire(&self, _key: &SessionKey, _ttl: Duration) -> BackendResult<bool> {
        Err(simulated())
    }

    async fn key_delete(&self, _key: &SessionKey) -> BackendResult<DeleteStatus> {
        Err(simulated())
    }

    fn name(&self) -> &str {
        "error"
    }
}
