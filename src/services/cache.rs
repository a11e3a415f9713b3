use anyhow::Result;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Short-lived in-memory cache for upstream lookups.
///
/// Values are stored as JSON so one cache can hold differently typed entries.
pub struct CacheService {
    memory: Cache<String, String>,
}

impl CacheService {
    pub fn new(ttl: Duration) -> Self {
        let memory = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self { memory }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cached = self.memory.get(key).await?;
        match serde_json::from_str(&cached) {
            Ok(value) => {
                tracing::debug!("Cache hit for key: {}", key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Dropping undecodable cache entry {}: {}", key, e);
                self.memory.invalidate(key).await;
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        self.memory.insert(key.to_string(), serialized).await;
        tracing::debug!("Cached key: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_reads_typed_values() {
        let cache = CacheService::new(Duration::from_secs(60));
        cache.set("chain:tip_height", &840_000u64).await.unwrap();

        assert_eq!(cache.get::<u64>("chain:tip_height").await, Some(840_000));
        assert_eq!(cache.get::<u64>("missing").await, None);
    }

    #[tokio::test]
    async fn type_mismatch_is_a_miss() {
        let cache = CacheService::new(Duration::from_secs(60));
        cache.set("key", &"text").await.unwrap();

        assert_eq!(cache.get::<u64>("key").await, None);
        assert_eq!(cache.get::<String>("key").await, None);
    }
}
