//! Network access for install-time population and cache misses.
//!
//! The `Fetcher` trait is the only way the cache manager reaches the
//! network, so tests can swap in a counting fake. `HttpFetcher` is the
//! real implementation on top of `reqwest`.

pub mod error;
pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::models::{Request, StoredResponse};

pub use error::NetworkError;
pub use http::HttpFetcher;

/// Issues a request and hands back whatever the server answered.
///
/// Non-2xx statuses are responses, not errors; only transport failures
/// come back as `NetworkError`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<StoredResponse, NetworkError>;
}
