//! In-memory key-value store.
//!
//! Always available, never fails. Serves two roles: the in-memory substitute
//! used by the fallback chain when the substrate is unreachable, and a
//! convenient store implementation for tests.

use dashmap::DashMap;
use serde_json::Value;

use super::traits::KeyValueStore;
use super::types::{Entries, StoreFuture};

/// DashMap-backed [`KeyValueStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[String]) -> StoreFuture<'_, Entries> {
        let mut found = Entries::new();
        for key in keys {
            if let Some(value) = self.entries.get(key) {
                found.insert(key.clone(), value.clone());
            }
        }
        Box::pin(async move { Ok(found) })
    }

    fn get_all(&self) -> StoreFuture<'_, Entries> {
        let all: Entries = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Box::pin(async move { Ok(all) })
    }

    fn set(&self, entries: Entries) -> StoreFuture<'_, ()> {
        for (key, value) in entries {
            self.entries.insert(key, value);
        }
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, keys: &[String]) -> StoreFuture<'_, ()> {
        for key in keys {
            self.entries.remove(key);
        }
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .set(Entries::from([("a".to_string(), json!(1))]))
            .await
            .unwrap();

        let got = store.get(&keys(&["a", "missing"])).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], json!(1));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = MemoryStore::new();
        store
            .set(Entries::from([("a".to_string(), json!("x"))]))
            .await
            .unwrap();

        store.remove(&keys(&["a"])).await.unwrap();
        store.remove(&keys(&["a"])).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_all_returns_every_entry() {
        let store = MemoryStore::new();
        store
            .set(Entries::from([
                ("a".to_string(), json!(1)),
                ("b".to_string(), json!(2)),
            ]))
            .await
            .unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn memory_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryStore>();
    }
}
