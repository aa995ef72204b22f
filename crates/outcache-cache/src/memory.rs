//! In-process store for tests and local development.
//!
//! An expired key is dropped the next time it is read, and every write that
//! would grow the map past its capacity first sweeps all expired entries,
//! then evicts the entry closest to expiry. The readiness flag can be
//! flipped to mimic a lost connection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{CacheStore, StoreError};

#[derive(Debug)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Capacity of [`MemoryStore::new`].
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    max_entries: usize,
    ready: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Store holding at most `max_entries` keys, never fewer than one.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ready: AtomicBool::new(true),
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        sweep_expired(&mut *self.entries.write().await)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Whether `key` holds a live entry.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_ready(&self) -> Result<(), StoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                target: self.target(),
            })
        }
    }
}

fn sweep_expired(entries: &mut HashMap<String, MemoryEntry>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired());
    let purged = before - entries.len();
    if purged > 0 {
        debug!(cache.purged = %purged, "Expired entries purged");
    }
    purged
}

/// Remove the live entry that would expire first.
fn evict_soonest(entries: &mut HashMap<String, MemoryEntry>) {
    let victim = entries
        .iter()
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(key, _)| key.clone());
    if let Some(key) = victim {
        entries.remove(&key);
        debug!(cache.key = %key, "Entry evicted at capacity");
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn target(&self) -> String {
        "memory".into()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_ready()?;

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(MemoryEntry::is_expired) {
            entries.remove(key);
            debug!(cache.key = %key, "Expired entry evicted");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.check_ready()?;
        let entry = MemoryEntry {
            value: value.to_vec(),
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            sweep_expired(&mut entries);
            if entries.len() >= self.max_entries {
                evict_soonest(&mut entries);
            }
        }
        entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_ready()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError> {
        self.check_ready()?;
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn delete_prefixed(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check_ready()?;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store.set("k", b"v", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = MemoryStore::new();
        for key in ["a", "b", "c"] {
            store.set(key, b"v", Duration::from_secs(60)).await.unwrap();
        }

        store
            .delete_many(&["a".to_string(), "c".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert!(!store.contains("a").await);
        assert!(store.contains("b").await);
        assert!(!store.contains("c").await);
    }

    #[tokio::test]
    async fn test_delete_prefixed() {
        let store = MemoryStore::new();
        for key in ["p|get|/r?a=1&", "p|get|/r|accept=x", "p|get|/r", "p|get|/rx?a=1&"] {
            store.set(key, b"v", Duration::from_secs(60)).await.unwrap();
        }

        assert_eq!(store.delete_prefixed("p|get|/r?").await.unwrap(), 1);
        assert_eq!(store.delete_prefixed("p|get|/r|").await.unwrap(), 1);
        assert_eq!(store.delete_prefixed("p|get|/r?").await.unwrap(), 0);

        assert!(store.contains("p|get|/r").await);
        assert!(store.contains("p|get|/rx?a=1&").await);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_at_capacity() {
        let store = MemoryStore::with_max_entries(100);
        for i in 0..1000 {
            store
                .set(&format!("dead{i}"), b"v", Duration::ZERO)
                .await
                .unwrap();
        }
        store.set("live", b"v", Duration::from_secs(60)).await.unwrap();

        assert!(store.entries.read().await.len() <= 100);
        assert_eq!(store.get("live").await.unwrap(), Some(b"v".to_vec()));

        let held = store.entries.read().await.len();
        assert_eq!(store.purge_expired().await, held - 1);
        assert_eq!(store.entries.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_full_store_evicts_entry_closest_to_expiry() {
        let store = MemoryStore::with_max_entries(2);
        store.set("short", b"v", Duration::from_secs(10)).await.unwrap();
        store.set("long", b"v", Duration::from_secs(600)).await.unwrap();

        store.set("long", b"w", Duration::from_secs(600)).await.unwrap();
        assert_eq!(store.len().await, 2);

        store.set("new", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(!store.contains("short").await);
        assert!(store.contains("long").await);
        assert!(store.contains("new").await);
    }

    #[tokio::test]
    async fn test_not_ready_rejects_operations() {
        let store = MemoryStore::new();
        store.set_ready(false);

        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(store.set("k", b"v", Duration::from_secs(1)).await.is_err());

        store.set_ready(true);
        assert!(store.set("k", b"v", Duration::from_secs(1)).await.is_ok());
    }
}
