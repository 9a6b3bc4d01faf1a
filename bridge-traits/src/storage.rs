//! Storage and File System Abstractions
//!
//! Platform-agnostic file I/O used by the content cache and the offline
//! library. Paths are always absolute and chosen by the core configuration.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<SystemTime>,
    pub is_directory: bool,
}

/// Capacity figures for the volume holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total: u64,
    pub available: u64,
}

/// File system access trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn stash(fs: &dyn FileSystemAccess, dir: &Path, data: &[u8]) -> Result<()> {
///     fs.create_dir_all(dir).await?;
///     let tmp = fs.create_temp_file(dir, "part").await?;
///     fs.write_file(&tmp, data.to_vec().into()).await?;
///     fs.rename(&tmp, &dir.join("final")).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it if it doesn't exist
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a file, swallowing and logging any failure.
    ///
    /// Returns whether the file is gone afterwards.
    async fn delete_best_effort(&self, path: &Path) -> bool;

    /// List the entries of a directory (non-recursive).
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open a file for streaming writes, truncating any previous content.
    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn core_async::io::AsyncWrite + Send + Unpin>>;

    /// Create a new, empty file with a unique name inside `dir`.
    ///
    /// The name ends in `.{extension}`; no other caller is ever handed the
    /// same path.
    async fn create_temp_file(&self, dir: &Path, extension: &str) -> Result<PathBuf>;

    /// Atomically move `from` onto `to`, replacing any existing file.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Bump the modification time of `path` to now.
    async fn touch(&self, path: &Path) -> Result<()>;

    /// Capacity of the volume holding `path`.
    async fn disk_space(&self, path: &Path) -> Result<DiskSpace>;
}
