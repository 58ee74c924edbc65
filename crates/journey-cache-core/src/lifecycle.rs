//! Registration host for cache manager versions.
//!
//! Stands in for the platform side of the worker lifecycle: a newly
//! registered version is installed first and only becomes the one answering
//! requests once its install has finished. A failed install leaves whatever
//! was active before in place. Retrying means registering again.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::Result;
use crate::models::Request;
use crate::network::Fetcher;
use crate::store::CacheStorage;
use crate::worker::{FetchOutcome, InstallReport, OfflineCacheManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Activated,
    /// Install failed, or a newer version took over
    Redundant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationStatus {
    pub cache_name: String,
    pub state: WorkerState,
}

pub struct WorkerRegistration<S, F> {
    active: RwLock<Option<OfflineCacheManager<S, F>>>,
    latest: RwLock<Option<RegistrationStatus>>,
    /// Used for requests while no version is active
    network: Arc<F>,
    /// One install at a time
    install_lock: Mutex<()>,
}

impl<S: CacheStorage, F: Fetcher> WorkerRegistration<S, F> {
    pub fn new(network: Arc<F>) -> Self {
        Self {
            active: RwLock::new(None),
            latest: RwLock::new(None),
            network,
            install_lock: Mutex::new(()),
        }
    }

    /// Install `manager` and make it the active version if the install succeeds.
    ///
    /// On failure the previous active version keeps serving and the install
    /// error is returned unchanged.
    pub async fn register(&self, manager: OfflineCacheManager<S, F>) -> Result<InstallReport> {
        let _guard = self.install_lock.lock().await;
        let cache_name = manager.cache_name().to_string();
        self.set_latest(&cache_name, WorkerState::Installing).await;

        match manager.install().await {
            Ok(report) => {
                let previous = self.active.write().await.replace(manager);
                self.set_latest(&cache_name, WorkerState::Activated).await;
                match previous {
                    Some(old) => info!(
                        cache = %cache_name,
                        superseded = old.cache_name(),
                        "Activated new version"
                    ),
                    None => info!(cache = %cache_name, "Activated"),
                }
                Ok(report)
            }
            Err(e) => {
                self.set_latest(&cache_name, WorkerState::Redundant).await;
                let active = self.active_version().await;
                warn!(cache = %cache_name, active = ?active, "Install failed; keeping previous version");
                Err(e)
            }
        }
    }

    /// Route a request through the active version, or straight to the
    /// network when nothing is active.
    pub async fn fetch(&self, request: Request) -> Result<FetchOutcome> {
        let active = self.active.read().await.clone();
        match active {
            Some(manager) => manager.handle_fetch(request).await,
            None => Ok(FetchOutcome::Network(self.network.fetch(&request).await?)),
        }
    }

    pub async fn active_version(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|m| m.cache_name().to_string())
    }

    /// Status of the most recent registration attempt.
    pub async fn status(&self) -> Option<RegistrationStatus> {
        self.latest.read().await.clone()
    }

    async fn set_latest(&self, cache_name: &str, state: WorkerState) {
        *self.latest.write().await = Some(RegistrationStatus {
            cache_name: cache_name.to_string(),
            state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    use crate::error::CacheError;
    use crate::manifest::{Deployment, Manifest};
    use crate::network::mock::MockFetcher;
    use crate::store::MemoryStorage;

    const ASSETS: [&str; 10] = [
        "/", "/static/style.css", "/map", "/login", "/1.jpg", "/2.jpg", "/3.jpg", "/4.jpg", "/5.jpg",
        "/about",
    ];

    fn setup() -> (Arc<MemoryStorage>, Arc<MockFetcher>, WorkerRegistration<MemoryStorage, MockFetcher>) {
        let storage = Arc::new(MemoryStorage::new());
        let fetcher = Arc::new(MockFetcher::serving(&ASSETS));
        let registration = WorkerRegistration::new(Arc::clone(&fetcher));
        (storage, fetcher, registration)
    }

    fn manager(
        storage: &Arc<MemoryStorage>,
        fetcher: &Arc<MockFetcher>,
        manifest: Manifest,
    ) -> OfflineCacheManager<MemoryStorage, MockFetcher> {
        let origin = Url::parse("http://localhost:5000").unwrap();
        OfflineCacheManager::new(Arc::clone(storage), Arc::clone(fetcher), manifest, origin)
    }

    fn get(path: &str) -> Request {
        Request::get(Url::parse("http://localhost:5000").unwrap().join(path).unwrap())
    }

    #[tokio::test]
    async fn test_uncontrolled_requests_go_to_network() {
        let (_storage, fetcher, registration) = setup();
        let outcome = registration.fetch(get("/1.jpg")).await.unwrap();
        assert!(!outcome.is_cache_hit());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(registration.active_version().await, None);
        assert_eq!(registration.status().await, None);
    }

    #[tokio::test]
    async fn test_successful_register_activates() {
        let (storage, fetcher, registration) = setup();
        registration
            .register(manager(&storage, &fetcher, Deployment::V1.manifest()))
            .await
            .unwrap();

        assert_eq!(registration.active_version().await.as_deref(), Some("journey-v1"));
        assert_eq!(
            registration.status().await,
            Some(RegistrationStatus {
                cache_name: "journey-v1".to_string(),
                state: WorkerState::Activated,
            })
        );

        fetcher.reset_calls();
        assert!(registration.fetch(get("/3.jpg")).await.unwrap().is_cache_hit());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_register_keeps_previous_version() {
        let (storage, fetcher, registration) = setup();
        registration
            .register(manager(&storage, &fetcher, Deployment::V1.manifest()))
            .await
            .unwrap();

        fetcher.go_offline("/login");
        let result = registration
            .register(manager(&storage, &fetcher, Deployment::V3.manifest()))
            .await;
        assert!(matches!(result, Err(CacheError::Fetch { .. })));

        assert_eq!(registration.active_version().await.as_deref(), Some("journey-v1"));
        assert_eq!(
            registration.status().await.map(|s| s.state),
            Some(WorkerState::Redundant)
        );

        fetcher.reset_calls();
        assert!(registration.fetch(get("/")).await.unwrap().is_cache_hit());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_first_register_leaves_page_uncontrolled() {
        let (storage, fetcher, registration) = setup();
        let manifest = Manifest::new("journey-v1", vec!["/".into(), "/missing-404.jpg".into()]);
        assert!(registration.register(manager(&storage, &fetcher, manifest)).await.is_err());
        assert_eq!(registration.active_version().await, None);

        fetcher.reset_calls();
        let outcome = registration.fetch(get("/")).await.unwrap();
        assert!(!outcome.is_cache_hit());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_register_again_after_failure() {
        let (storage, fetcher, registration) = setup();
        fetcher.go_offline("/map");
        assert!(registration
            .register(manager(&storage, &fetcher, Deployment::V3.manifest()))
            .await
            .is_err());

        // Back online for the second attempt
        let fetcher = Arc::new(MockFetcher::serving(&ASSETS));
        registration
            .register(manager(&storage, &fetcher, Deployment::V3.manifest()))
            .await
            .unwrap();
        assert_eq!(registration.active_version().await.as_deref(), Some("journey-v3"));
    }

    #[tokio::test]
    async fn test_new_version_supersedes_without_deleting_old_bucket() {
        let (storage, fetcher, registration) = setup();
        registration
            .register(manager(&storage, &fetcher, Deployment::V1.manifest()))
            .await
            .unwrap();
        registration
            .register(manager(&storage, &fetcher, Deployment::V3.manifest()))
            .await
            .unwrap();

        assert_eq!(registration.active_version().await.as_deref(), Some("journey-v3"));
        assert_eq!(
            storage.bucket_names().await.unwrap(),
            vec!["journey-v1", "journey-v3"]
        );
    }
}
