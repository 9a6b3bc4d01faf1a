//! # Core Configuration Module
//!
//! `CoreConfig` carries every path, budget and host bridge the core needs.
//! It is assembled with [`CoreConfig::builder`] and validated eagerly: a
//! missing bridge or an impossible budget fails at `build()` rather than on
//! first use.
//!
//! ## Required
//!
//! - `database_path`: SQLite file backing the offline library
//! - `cache_dir`: root of the streaming content cache
//!
//! ## Optional (with defaults)
//!
//! - `offline_dir`: where offline downloads live (default: `offline/` next to the database)
//! - `cache_max_bytes` / `cache_max_files`: hard caps for the content cache
//! - `HttpClient` / `FileSystemAccess`: injected by the host; with the
//!   `desktop-shims` feature the reqwest/tokio implementations are used when
//!   nothing is provided
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/library.db")
//!     .cache_dir("/cache/video")
//!     .cache_max_bytes(256 * 1024 * 1024)
//!     .http_client(Arc::new(MyHttpClient))
//!     .file_system(Arc::new(MyFileSystem))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default hard byte cap for the content cache (512 MiB).
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 512 * 1024 * 1024;

/// Default hard file-count cap for the content cache.
pub const DEFAULT_CACHE_MAX_FILES: usize = 100;

/// Validated core configuration. Build with [`CoreConfig::builder`].
#[derive(Clone)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub cache_dir: PathBuf,
    pub offline_dir: PathBuf,
    pub cache_max_bytes: u64,
    pub cache_max_files: usize,
    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("cache_dir", &self.cache_dir)
            .field("offline_dir", &self.offline_dir)
            .field("cache_max_bytes", &self.cache_max_bytes)
            .field("cache_max_files", &self.cache_max_files)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }
        if self.offline_dir.as_os_str().is_empty() {
            return Err(Error::Config("Offline directory cannot be empty".to_string()));
        }
        if self.cache_dir.starts_with(&self.offline_dir) || self.offline_dir.starts_with(&self.cache_dir) {
            return Err(Error::Config(
                "Cache and offline directories must not overlap: the cache sweep would evict offline files"
                    .to_string(),
            ));
        }
        // Both directories are pruned of files no entry or row references.
        for (name, dir) in [("Offline", &self.offline_dir), ("Cache", &self.cache_dir)] {
            if self.database_path.starts_with(dir) {
                return Err(Error::Config(format!(
                    "{name} directory {} must not contain the database file",
                    dir.display()
                )));
            }
        }
        if self.cache_max_bytes == 0 {
            return Err(Error::Config(
                "cache_max_bytes must be greater than 0".to_string(),
            ));
        }
        if self.cache_max_files == 0 {
            return Err(Error::Config(
                "cache_max_files must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for cache and offline downloads. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Mobile: inject the platform-native networking adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for the content cache and offline storage. \
                  Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                  Mobile: inject the sandboxed file system adapter."
            .to_string(),
    })
}

fn default_offline_dir(database_path: &Path) -> PathBuf {
    database_path
        .parent()
        .map(|parent| parent.join("offline"))
        .unwrap_or_else(|| PathBuf::from("offline"))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    offline_dir: Option<PathBuf>,
    cache_max_bytes: Option<u64>,
    cache_max_files: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn offline_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.offline_dir = Some(path.into());
        self
    }

    /// Hard byte cap for the content cache. The effective budget may be
    /// lower once disk capacity is taken into account.
    pub fn cache_max_bytes(mut self, bytes: u64) -> Self {
        self.cache_max_bytes = Some(bytes);
        self
    }

    pub fn cache_max_files(mut self, count: usize) -> Self {
        self.cache_max_files = Some(count);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Validate and assemble the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when a required path is missing or a value is invalid
    /// - [`Error::CapabilityMissing`] when a bridge is absent and no desktop
    ///   default is compiled in
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;
        let offline_dir = self
            .offline_dir
            .unwrap_or_else(|| default_offline_dir(&database_path));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };
        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = CoreConfig {
            database_path,
            cache_dir,
            offline_dir,
            cache_max_bytes: self.cache_max_bytes.unwrap_or(DEFAULT_CACHE_MAX_BYTES),
            cache_max_files: self.cache_max_files.unwrap_or(DEFAULT_CACHE_MAX_FILES),
            http_client,
            file_system,
        };

        config.validate()?;
        Ok(config)
    }
}
