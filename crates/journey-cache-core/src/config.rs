//! Application configuration management.
//!
//! This module handles loading the configuration: the origin the assets are
//! fetched from, which deployment (cache name + manifest) is current, and
//! where buckets are persisted.
//!
//! Configuration is stored at `~/.config/journey-cache/config.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CacheError, Result};
use crate::manifest::{Deployment, Manifest};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "journey-cache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the journey site is served during development
pub const DEFAULT_ORIGIN: &str = "http://localhost:5000";

/// Environment variable that overrides `origin`
pub const ORIGIN_ENV: &str = "JOURNEY_CACHE_ORIGIN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    pub deployment: Deployment,
    /// Replaces the built-in manifest of `deployment` when set
    pub manifest: Option<Manifest>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            deployment: Deployment::default(),
            manifest: None,
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(origin) = std::env::var(ORIGIN_ENV) {
            if !origin.trim().is_empty() {
                config.origin = origin.trim().to_string();
            }
        }
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            CacheError::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find config directory",
            ))
        })?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn origin_url(&self) -> Result<Url> {
        let url = Url::parse(&self.origin).map_err(|e| CacheError::InvalidPath {
            path: self.origin.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(CacheError::InvalidPath {
                path: self.origin.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }

    /// The manifest in effect: the custom one if configured, else the deployment's.
    pub fn manifest(&self) -> Manifest {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.deployment.manifest())
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir().ok_or_else(|| {
            CacheError::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find cache directory",
            ))
        })?;
        Ok(cache_dir.join(APP_NAME))
    }
}
