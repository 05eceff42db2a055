//! Ephemeral key-value store backing `storage_read` / `storage_write`.
//!
//! Untyped string values, process-lifetime only — no persistence, no TTL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<String, KvError>;
    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;
}

/// Default `KvStore`: a single shared `HashMap` guarded by an async lock.
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKvStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<String, KvError> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(KvError::NotFound)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_value() {
        let store = InMemoryKvStore::new();
        store.set("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), "v");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryKvStore::new();
        assert!(matches!(store.get("missing").await, Err(KvError::NotFound)));
    }
}
