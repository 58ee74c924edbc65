//! Offline cache manager: install-time population and fetch interception.
//!
//! On install the manager opens the bucket named by its manifest and stores
//! every manifest entry in one all-or-nothing batch. On fetch it answers from
//! any open bucket and only goes to the network on a miss. Responses fetched
//! on a miss are never written back.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{CacheError, Result};
use crate::manifest::Manifest;
use crate::models::{Request, RequestKey, StoredResponse};
use crate::network::Fetcher;
use crate::store::CacheStorage;

/// What a successful install stored.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub cache_name: String,
    /// Stored keys in manifest order
    pub keys: Vec<RequestKey>,
    pub bytes: usize,
}

/// Where a fetch was answered from.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Cache {
        bucket: String,
        response: StoredResponse,
    },
    Network(StoredResponse),
}

impl FetchOutcome {
    pub fn response(&self) -> &StoredResponse {
        match self {
            FetchOutcome::Cache { response, .. } => response,
            FetchOutcome::Network(response) => response,
        }
    }

    pub fn into_response(self) -> StoredResponse {
        match self {
            FetchOutcome::Cache { response, .. } => response,
            FetchOutcome::Network(response) => response,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, FetchOutcome::Cache { .. })
    }
}

pub struct OfflineCacheManager<S, F> {
    storage: Arc<S>,
    fetcher: Arc<F>,
    manifest: Manifest,
    origin: Url,
}

// Manual impl: a derive would demand S: Clone and F: Clone.
impl<S, F> Clone for OfflineCacheManager<S, F> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            fetcher: Arc::clone(&self.fetcher),
            manifest: self.manifest.clone(),
            origin: self.origin.clone(),
        }
    }
}

impl<S: CacheStorage, F: Fetcher> OfflineCacheManager<S, F> {
    pub fn new(storage: Arc<S>, fetcher: Arc<F>, manifest: Manifest, origin: Url) -> Self {
        Self {
            storage,
            fetcher,
            manifest,
            origin,
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.manifest.cache_name
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Populate this version's bucket from the manifest.
    ///
    /// Entries are fetched concurrently. Any transport failure or non-2xx
    /// response fails the whole install and nothing from the batch is stored.
    pub async fn install(&self) -> Result<InstallReport> {
        let cache_name = self.manifest.cache_name.as_str();
        let urls = self.manifest.resolve(&self.origin)?;

        self.storage.open(cache_name).await?;
        info!(cache = cache_name, "Opened cache");

        let fetches = urls.into_iter().map(|url| self.fetch_for_install(url));
        let entries = match try_join_all(fetches).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(cache = cache_name, error = %e, "Install failed, nothing stored");
                return Err(e);
            }
        };

        let keys: Vec<RequestKey> = entries.iter().map(|(key, _)| key.clone()).collect();
        let bytes: usize = entries.iter().map(|(_, r)| r.content_length()).sum();
        self.storage.put_all(cache_name, entries).await?;

        info!(cache = cache_name, entries = keys.len(), bytes, "Install complete");
        Ok(InstallReport {
            cache_name: cache_name.to_string(),
            keys,
            bytes,
        })
    }

    async fn fetch_for_install(&self, url: Url) -> Result<(RequestKey, StoredResponse)> {
        let request = Request::get(url);
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|source| CacheError::Fetch {
                url: request.url.to_string(),
                source,
            })?;

        if !response.is_ok() {
            return Err(CacheError::from_status(
                request.url.as_str(),
                response.status,
                &response.body,
            ));
        }
        Ok((request.key(), response))
    }

    /// Answer a request from any open bucket, falling back to the network.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome> {
        let key = request.key();

        if let Some((bucket, response)) = self.storage.match_any(&key).await? {
            debug!(request = %key, cache = %bucket, "Cache hit");
            return Ok(FetchOutcome::Cache { bucket, response });
        }

        debug!(request = %key, "Cache miss, forwarding to network");
        let response = self.fetcher.fetch(&request).await?;
        Ok(FetchOutcome::Network(response))
    }

    /// Same as `handle_fetch`, dropping where the response came from.
    pub async fn respond(&self, request: Request) -> Result<StoredResponse> {
        Ok(self.handle_fetch(request).await?.into_response())
    }

    /// Resolve a path against the origin and build a GET for it.
    pub fn request_for(&self, path: &str) -> Result<Request> {
        let url = self.origin.join(path).map_err(|e| CacheError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Request::get(url))
    }
}
