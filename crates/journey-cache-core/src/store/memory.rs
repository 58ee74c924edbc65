use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BucketInfo, CacheStorage};
use crate::error::{CacheError, Result};
use crate::manifest::validate_cache_name;
use crate::models::{RequestKey, StoredResponse};

struct MemoryBucket {
    name: String,
    created_at: DateTime<Utc>,
    entries: Vec<(RequestKey, StoredResponse)>,
}

/// In-process cache store. Contents live as long as the value does.
#[derive(Default)]
pub struct MemoryStorage {
    buckets: RwLock<Vec<MemoryBucket>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<()> {
        validate_cache_name(name)?;
        let mut buckets = self.buckets.write().await;
        if !buckets.iter().any(|b| b.name == name) {
            buckets.push(MemoryBucket {
                name: name.to_string(),
                created_at: Utc::now(),
                entries: Vec::new(),
            });
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.buckets.read().await.iter().any(|b| b.name == name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|b| b.name != name);
        Ok(buckets.len() != before)
    }

    async fn bucket_names(&self) -> Result<Vec<String>> {
        Ok(self.buckets.read().await.iter().map(|b| b.name.clone()).collect())
    }

    async fn buckets(&self) -> Result<Vec<BucketInfo>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|b| BucketInfo {
                name: b.name.clone(),
                created_at: b.created_at,
                entries: b.entries.len(),
            })
            .collect())
    }

    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, StoredResponse)>) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .iter_mut()
            .find(|b| b.name == name)
            .ok_or_else(|| CacheError::BucketNotFound(name.to_string()))?;

        for (key, response) in entries {
            match bucket.entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = response,
                None => bucket.entries.push((key, response)),
            }
        }
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .find(|b| b.name == name)
            .and_then(|b| b.entries.iter().find(|(k, _)| k == key))
            .map(|(_, response)| response.clone()))
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>> {
        let buckets = self.buckets.read().await;
        let bucket = buckets
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| CacheError::BucketNotFound(name.to_string()))?;
        Ok(bucket.entries.iter().map(|(k, _)| k.clone()).collect())
    }
}
