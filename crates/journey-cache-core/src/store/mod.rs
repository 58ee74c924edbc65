//! Named cache buckets holding pre-fetched responses.
//!
//! This module provides the `CacheStorage` trait the cache manager is built
//! against, plus two backends:
//! - `MemoryStorage`: in-process store, used by tests and short-lived hosts
//! - `DiskStorage`: persistent store under a cache directory
//!
//! Buckets are kept in creation order. A lookup across all buckets checks
//! them in that order and answers with the first hit.

pub mod disk;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{RequestKey, StoredResponse};

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

/// Summary of one bucket for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub entries: usize,
}

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the named bucket, creating it if absent. Never creates a second
    /// bucket under an existing name.
    async fn open(&self, name: &str) -> Result<()>;

    async fn has(&self, name: &str) -> Result<bool>;

    /// Remove a bucket and everything in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Bucket names in creation order.
    async fn bucket_names(&self) -> Result<Vec<String>>;

    async fn buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Store a batch atomically: afterwards either every entry is visible or
    /// none is. An entry whose key is already present replaces the old one.
    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, StoredResponse)>) -> Result<()>;

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>>;

    /// Keys in insertion order.
    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>>;

    /// Look `key` up in every bucket, oldest first. Returns the bucket name
    /// alongside the hit.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<(String, StoredResponse)>> {
        for name in self.bucket_names().await? {
            if let Some(response) = self.match_in(&name, key).await? {
                return Ok(Some((name, response)));
            }
        }
        Ok(None)
    }
}
