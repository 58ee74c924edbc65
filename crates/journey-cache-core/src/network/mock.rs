//! Counting fake fetcher for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Fetcher, NetworkError};
use crate::models::{Request, StoredResponse};

/// Serves canned responses by URL path and counts every call.
///
/// Unknown paths answer 404 like the origin server does; paths marked
/// offline fail with `NetworkError::Unreachable`.
pub(crate) struct MockFetcher {
    routes: Mutex<HashMap<String, StoredResponse>>,
    offline: Mutex<Vec<String>>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            offline: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// A fetcher that answers 200 for every given path, body = path.
    pub(crate) fn serving(paths: &[&str]) -> Self {
        let fetcher = Self::new();
        for path in paths {
            fetcher.route(path, 200, path.as_bytes());
        }
        fetcher
    }

    pub(crate) fn route(&self, path: &str, status: u16, body: &[u8]) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), StoredResponse::new(path, status, body.to_vec()));
    }

    pub(crate) fn go_offline(&self, path: &str) {
        self.offline.lock().unwrap().push(path.to_string());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<StoredResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = request.url.path().to_string();
        self.log.lock().unwrap().push(path.clone());

        if self.offline.lock().unwrap().contains(&path) {
            return Err(NetworkError::Unreachable(request.url.to_string()));
        }

        let found = self.routes.lock().unwrap().get(&path).cloned();
        let mut response = found.unwrap_or_else(|| StoredResponse::new(&path, 404, "Not found"));
        response.url = request.url.to_string();
        Ok(response)
    }
}
