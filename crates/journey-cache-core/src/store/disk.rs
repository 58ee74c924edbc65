//! Persistent cache store on the local filesystem.
//!
//! Layout under the cache directory:
//!
//! ```text
//! buckets.json                         registry, creation order
//! buckets/<bucket>/index.json          CachedData<Vec<IndexEntry>>
//! buckets/<bucket>/bodies/<sha256>.bin response bodies, content-addressed
//! ```
//!
//! Bucket directories live under their own `buckets/` directory so no cache
//! name can collide with the registry file.
//!
//! Index and registry files are replaced by writing a temp file and renaming
//! it into place, so readers see either the old or the new contents. Body
//! files no index entry points at are removed after each index swap.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{BucketInfo, CacheStorage};
use crate::error::{CacheError, Result};
use crate::manifest::validate_cache_name;
use crate::models::{CachedData, RequestKey, StoredResponse};

const REGISTRY_FILE: &str = "buckets.json";
const BUCKETS_DIR: &str = "buckets";
const INDEX_FILE: &str = "index.json";
const BODIES_DIR: &str = "bodies";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BucketRecord {
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    key: RequestKey,
    response: StoredResponse,
    body_file: String,
}

pub struct DiskStorage {
    cache_dir: PathBuf,
    /// Serializes writers; readers rely on atomic renames instead.
    write_lock: Mutex<()>,
}

impl DiskStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn registry_path(&self) -> PathBuf {
        self.cache_dir.join(REGISTRY_FILE)
    }

    fn bucket_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(BUCKETS_DIR).join(name)
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.bucket_dir(name).join(INDEX_FILE)
    }

    fn body_path(&self, name: &str, body_file: &str) -> PathBuf {
        self.bucket_dir(name).join(BODIES_DIR).join(body_file)
    }

    async fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let contents = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn load_registry(&self) -> Result<Vec<BucketRecord>> {
        Ok(Self::load(&self.registry_path()).await?.unwrap_or_default())
    }

    async fn load_index(&self, name: &str) -> Result<Option<CachedData<Vec<IndexEntry>>>> {
        Self::load(&self.index_path(name)).await
    }

    /// Body files are named by content hash, so writing one never clobbers
    /// a body an existing index still points at.
    fn body_file_name(body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body);
        format!("{}.bin", hex::encode(hasher.finalize()))
    }

    /// Remove body files of `name` not in `live`. Runs after the index swap,
    /// so a failure here only leaves garbage behind and is not an error.
    async fn prune_bodies(&self, name: &str, live: &HashSet<String>) {
        let dir = self.bucket_dir(name).join(BODIES_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(cache = name, error = %e, "Could not scan body files");
                return;
            }
        };
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if live.contains(&file_name) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(cache = name, file = %file_name, error = %e, "Could not remove body file"),
            }
        }
        if removed > 0 {
            debug!(cache = name, removed, "Pruned unreferenced body files");
        }
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> Result<()> {
        validate_cache_name(name)?;
        let _guard = self.write_lock.lock().await;

        let mut registry = self.load_registry().await?;
        if registry.iter().any(|r| r.name == name) {
            return Ok(());
        }

        tokio::fs::create_dir_all(self.bucket_dir(name).join(BODIES_DIR)).await?;
        Self::save(&self.index_path(name), &CachedData::new(Vec::<IndexEntry>::new())).await?;
        registry.push(BucketRecord {
            name: name.to_string(),
            created_at: Utc::now(),
        });
        Self::save(&self.registry_path(), &registry).await?;
        debug!(cache = name, dir = %self.cache_dir.display(), "Created cache bucket");
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.load_registry().await?.iter().any(|r| r.name == name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut registry = self.load_registry().await?;
        let before = registry.len();
        registry.retain(|r| r.name != name);
        if registry.len() == before {
            return Ok(false);
        }

        // Unregister first so lookups stop seeing the bucket before its files go.
        Self::save(&self.registry_path(), &registry).await?;
        if let Err(e) = tokio::fs::remove_dir_all(self.bucket_dir(name)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        Ok(true)
    }

    async fn bucket_names(&self) -> Result<Vec<String>> {
        Ok(self.load_registry().await?.into_iter().map(|r| r.name).collect())
    }

    async fn buckets(&self) -> Result<Vec<BucketInfo>> {
        let mut infos = Vec::new();
        for record in self.load_registry().await? {
            let entries = self
                .load_index(&record.name)
                .await?
                .map(|index| index.data.len())
                .unwrap_or(0);
            infos.push(BucketInfo {
                name: record.name,
                created_at: record.created_at,
                entries,
            });
        }
        Ok(infos)
    }

    async fn put_all(&self, name: &str, entries: Vec<(RequestKey, StoredResponse)>) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if !self.load_registry().await?.iter().any(|r| r.name == name) {
            return Err(CacheError::BucketNotFound(name.to_string()));
        }
        let mut index = self
            .load_index(name)
            .await?
            .map(|cached| cached.data)
            .unwrap_or_default();

        // Bodies first; nothing references them until the index is swapped.
        for (key, response) in entries {
            let body_file = Self::body_file_name(&response.body);
            let body_path = self.body_path(name, &body_file);
            if tokio::fs::metadata(&body_path).await.is_err() {
                tokio::fs::write(&body_path, &response.body).await?;
            }

            let entry = IndexEntry {
                key,
                response,
                body_file,
            };
            match index.iter_mut().find(|e| e.key == entry.key) {
                Some(slot) => *slot = entry,
                None => index.push(entry),
            }
        }

        let live: HashSet<String> = index.iter().map(|e| e.body_file.clone()).collect();
        Self::save(&self.index_path(name), &CachedData::new(index)).await?;
        self.prune_bodies(name, &live).await;
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
        // A writer may swap the index and prune the body we just looked up;
        // the second pass sees the new index.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let Some(index) = self.load_index(name).await? else {
                return Ok(None);
            };
            let Some(entry) = index.data.into_iter().find(|e| &e.key == key) else {
                return Ok(None);
            };

            match tokio::fs::read(self.body_path(name, &entry.body_file)).await {
                Ok(body) => {
                    let mut response = entry.response;
                    response.body = body;
                    return Ok(Some(response));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && attempts < 2 => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>> {
        let index = self
            .load_index(name)
            .await?
            .ok_or_else(|| CacheError::BucketNotFound(name.to_string()))?;
        Ok(index.data.into_iter().map(|e| e.key).collect())
    }
}
