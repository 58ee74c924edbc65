//! Core library for journey-cache.
//!
//! An offline cache manager in the shape of a browser service worker: on
//! install it pre-fetches a fixed manifest of assets into a version-named
//! cache bucket, and on every request it answers from the cache when it can
//! and from the network when it can't.
//!
//! The persistent store and the network are injected through the
//! [`store::CacheStorage`] and [`network::Fetcher`] traits.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod models;
pub mod network;
pub mod store;
pub mod worker;

pub use config::Config;
pub use error::{CacheError, Result};
pub use lifecycle::{RegistrationStatus, WorkerRegistration, WorkerState};
pub use manifest::{Deployment, Manifest};
pub use models::{CachedData, Request, RequestKey, StoredResponse};
pub use network::{Fetcher, HttpFetcher, NetworkError};
pub use store::{BucketInfo, CacheStorage, DiskStorage, MemoryStorage};
pub use worker::{FetchOutcome, InstallReport, OfflineCacheManager};
