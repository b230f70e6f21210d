//! In-memory response cache keyed by request URL

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Cached upstream payload
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// When the payload was stored
    pub stored_at: Instant,
    /// Parsed response body
    pub payload: Arc<Value>,
}

impl CacheEntry {
    /// Fresh iff younger than `ttl`; a zero TTL is never fresh
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Response cache for one upstream API
///
/// Entries are overwritten by later successful responses and never merged.
/// Freshness is judged by each caller's own TTL, so nothing is evicted
/// implicitly; `purge_older_than` is available for an explicit sweep.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Response cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Response cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Returns the payload for `key` if it is fresh under `ttl`
    pub fn get_fresh(&self, key: &str, ttl: Duration) -> Option<Arc<Value>> {
        self.read()
            .get(key)
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| entry.payload.clone())
    }

    /// Stores (or replaces) the payload for `key`
    pub fn insert(&self, key: &str, payload: Arc<Value>) {
        self.write().insert(
            key.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                payload,
            },
        );
    }

    /// Returns the raw entry regardless of freshness
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.read().get(key).cloned()
    }

    /// Drops every entry older than `max_age`, returning how many were removed
    pub fn purge_older_than(&self, max_age: Duration) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < max_age);
        before - entries.len()
    }

    /// Removes every entry
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
