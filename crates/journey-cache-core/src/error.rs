use thiserror::Error;

use crate::network::NetworkError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: NetworkError,
    },

    #[error("Bad response for {url}: status {status}: {body}")]
    BadStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Duplicate request in manifest: {0}")]
    DuplicateRequest(String),

    #[error("Invalid manifest path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid cache name '{0}'")]
    InvalidCacheName(String),

    #[error("Cache bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl CacheError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &[u8]) -> String {
        let text = String::from_utf8_lossy(body);
        if text.len() <= MAX_ERROR_BODY_LENGTH {
            text.into_owned()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &text[..end], body.len())
        }
    }

    pub fn from_status(url: &str, status: u16, body: &[u8]) -> Self {
        CacheError::BadStatus {
            url: url.to_string(),
            status,
            body: Self::truncate_body(body),
        }
    }
}
