//! Pre-cache manifests and the deployments they belong to.
//!
//! A manifest pairs a version-qualified cache name with the ordered list of
//! asset paths fetched at install time. It never changes for the lifetime of
//! one cache name; a new asset list ships under a new name.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CacheError, Result};
use crate::models::RequestKey;

/// Built-in deployments of the journey site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deployment {
    /// Single-page static site
    #[serde(rename = "journey-v1")]
    V1,
    /// Adds the routed `/map` and `/login` pages
    #[default]
    #[serde(rename = "journey-v3")]
    V3,
}

impl Deployment {
    pub fn cache_name(self) -> &'static str {
        match self {
            Deployment::V1 => "journey-v1",
            Deployment::V3 => "journey-v3",
        }
    }

    pub fn manifest(self) -> Manifest {
        let pages: &[&str] = match self {
            Deployment::V1 => &["/", "/static/style.css"],
            Deployment::V3 => &["/", "/map", "/login"],
        };
        let paths = pages
            .iter()
            .map(|p| p.to_string())
            .chain((1..=5).map(|n| format!("/{}.jpg", n)))
            .collect();
        Manifest {
            cache_name: self.cache_name().to_string(),
            paths,
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_name())
    }
}

impl FromStr for Deployment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "journey-v1" | "v1" => Ok(Deployment::V1),
            "journey-v3" | "v3" => Ok(Deployment::V3),
            other => Err(format!("unknown deployment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub cache_name: String,
    pub paths: Vec<String>,
}

impl Manifest {
    pub fn new(cache_name: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            paths,
        }
    }

    /// Resolve every path against `origin`, in manifest order.
    ///
    /// Fails before any network traffic on an unusable cache name, an empty
    /// list, a path that does not resolve to an http(s) URL, or two paths
    /// naming the same request.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>> {
        validate_cache_name(&self.cache_name)?;
        if self.paths.is_empty() {
            return Err(CacheError::InvalidPath {
                path: String::new(),
                reason: "manifest has no entries".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let url = origin.join(path).map_err(|e| CacheError::InvalidPath {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(CacheError::InvalidPath {
                    path: path.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
            if !seen.insert(RequestKey::get(&url)) {
                return Err(CacheError::DuplicateRequest(path.clone()));
            }
            urls.push(url);
        }
        Ok(urls)
    }
}

/// Cache names become directory names in the disk store.
pub fn validate_cache_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidCacheName(name.to_string()))
    }
}
