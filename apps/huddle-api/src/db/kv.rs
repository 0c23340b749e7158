use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ApiError;

/// Abstraction over a key-value store used for session tokens and seen
/// assertion ids.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError>;
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    async fn del(&self, key: &str) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    data: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError> {
        let now = Instant::now();
        let mut data = self.data.lock();
        // Reads only drop the key they touch; writes purge the rest.
        data.retain(|_, (_, expires_at)| *expires_at > now);
        data.insert(
            key.to_string(),
            (value.to_string(), now + Duration::from_secs(ttl_secs)),
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let mut data = self.data.lock();
        match data.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                data.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<(), ApiError> {
        self.data.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_del() {
        let kv = MemoryStore::new();
        kv.set_ex("k", "v", 60).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
        kv.del("k").await.unwrap();
        assert!(kv.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let kv = MemoryStore::new();
        kv.set_ex("k", "v", 0).await.unwrap();
        assert!(kv.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_purge_expired_entries() {
        let kv = MemoryStore::new();
        kv.set_ex("stale", "v", 0).await.unwrap();
        kv.set_ex("fresh", "v", 60).await.unwrap();

        let data = kv.data.lock();
        assert_eq!(data.len(), 1);
        assert!(data.contains_key("fresh"));
    }
}
