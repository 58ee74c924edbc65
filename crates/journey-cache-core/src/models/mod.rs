//! Data models for intercepted requests and cached responses.
//!
//! - `Request`, `RequestKey`: an outgoing request and the identity used for lookups
//! - `StoredResponse`: a response as held in a cache bucket
//! - `CachedData`: timestamp wrapper for persisted records

pub mod cached;
pub mod request;
pub mod response;

pub use cached::CachedData;
pub use request::{Request, RequestKey};
pub use response::StoredResponse;
