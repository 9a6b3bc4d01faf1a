//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{DiskSpace, FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use core_async::fs;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Tokio-based file system implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await?;
        Ok(FileMetadata {
            size: metadata.len(),
            modified_at: metadata.modified().ok(),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        Self::ensure_parent(path).await?;
        fs::write(path, data.as_ref()).await?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_best_effort(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = ?path, "Deleted file");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to delete file");
                false
            }
        }
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            entries.push(entry.path());
        }
        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn core_async::io::AsyncWrite + Send + Unpin>> {
        Self::ensure_parent(path).await?;
        let file = fs::File::create(path).await?;
        debug!(path = ?path, "Opened file for writing");
        Ok(Box::new(file))
    }

    async fn create_temp_file(&self, dir: &Path, extension: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).await?;
        let extension = extension.trim_start_matches('.');
        let path = dir.join(format!("{}.{}", Uuid::new_v4().simple(), extension));
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        debug!(path = ?path, "Created temp file");
        Ok(path)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).await?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }

    async fn touch(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        core_async::task::spawn_blocking(move || {
            filetime::set_file_mtime(&path, FileTime::now())
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("touch task failed: {}", e)))??;
        Ok(())
    }

    async fn disk_space(&self, path: &Path) -> Result<DiskSpace> {
        let path = path.to_path_buf();
        let space = core_async::task::spawn_blocking(move || -> std::io::Result<DiskSpace> {
            Ok(DiskSpace {
                total: fs2::total_space(&path)?,
                available: fs2::available_space(&path)?,
            })
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("disk space task failed: {}", e)))??;
        Ok(space)
    }
}
