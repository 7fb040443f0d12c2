//! Key-value cache backends.
//!
//! Everything the resolvers and providers persist goes through [`KeyValueStore`]: string
//! keys, string values, no expiry unless the backend is configured with one. The in-memory
//! backend lives here; the Redis one is in [`crate::redis_manager`].

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Minimal capability the cache-aside layer needs from a store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Human-readable backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Process-local store backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys starting with `prefix`, unordered.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|value| value.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_overwrite() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("current_block").await.unwrap(), None);

        store.set("current_block", "100").await.unwrap();
        store.set("current_block", "101").await.unwrap();
        assert_eq!(store.get("current_block").await.unwrap().as_deref(), Some("101"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = InMemoryStore::new();
        let clone = store.clone();
        clone.set("erc20:0x01:symbol", "WETH").await.unwrap();

        assert!(store.contains_key("erc20:0x01:symbol"));
        assert_eq!(store.keys_with_prefix("erc20:"), vec!["erc20:0x01:symbol".to_string()]);
    }
}
