//! # Offline Sync Engine
//!
//! Reconciles the user's "keep offline" list with the persisted offline
//! library.
//!
//! ## Workflow
//!
//! 1. Prune rows whose file disappeared, then diff the desired list against
//!    the persisted rows
//! 2. Unregister rows that are no longer desired (files, then rows in one
//!    transaction)
//! 3. Register new remote items one at a time: stream into a private temp
//!    file, then insert the row and its chapters in one transaction
//! 4. Rewrite `sort_order` so it matches the desired list
//! 5. Delete files in the storage directory that no row references
//!
//! A failed download or an item with invalid metadata only drops that item.
//! Storage failures abort the sync with an error.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{DesiredVideo, NoopProgressSink, OfflineSyncEngine, RemoteVideo};
//!
//! # async fn example(engine: &OfflineSyncEngine) -> core_sync::Result<()> {
//! let desired = vec![
//!     DesiredVideo::Offline("https://cdn.example.com/v/1.mp4".into()),
//!     DesiredVideo::Remote(RemoteVideo::new("https://cdn.example.com/v/2.mp4", "Two")),
//! ];
//! match engine.set_offline_videos(&desired, &NoopProgressSink).await? {
//!     Some(library) => println!("{} videos offline", library.len()),
//!     None => println!("another sync is running"),
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{FileSystemAccess, HttpClient};
use core_async::io::{AsyncReadExt, AsyncWriteExt};
use core_async::sync::SingleFlight;
use core_library::{ChapterEntry, FilterUpdate, OfflineEntry, OfflineLibraryRepository, VideoKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::progress::{ProgressSink, ProgressTracker};
use crate::{Result, SyncError};

const CHUNK_SIZE: usize = 64 * 1024;

/// A chapter marker supplied with a remote item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChapter {
    pub position: i64,
    pub label: Option<String>,
    pub skip: bool,
}

/// A video that is not in the offline library yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVideo {
    pub key: VideoKey,
    pub display_name: String,
    pub trim_start: i64,
    /// 0 plays to the end
    pub trim_end: i64,
    pub media_type: String,
    pub filter_flag: i64,
    pub duration_ms: i64,
    pub chapters: Vec<RemoteChapter>,
}

impl RemoteVideo {
    pub fn new(locator: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: VideoKey::new(locator),
            display_name: display_name.into(),
            trim_start: 0,
            trim_end: 0,
            media_type: "video/mp4".to_string(),
            filter_flag: 0,
            duration_ms: 0,
            chapters: Vec::new(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn with_trim(mut self, start: i64, end: i64) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_filter_flag(mut self, filter_flag: i64) -> Self {
        self.filter_flag = filter_flag;
        self
    }

    pub fn with_chapter(mut self, position: i64, label: Option<&str>, skip: bool) -> Self {
        self.chapters.push(RemoteChapter {
            position,
            label: label.map(str::to_string),
            skip,
        });
        self
    }

    pub fn locator(&self) -> &str {
        self.key.as_str()
    }

    fn to_entry(&self, file_path: PathBuf, sort_order: i64, size_bytes: u64) -> OfflineEntry {
        OfflineEntry {
            video_key: self.key.clone(),
            file_path,
            display_name: self.display_name.clone(),
            trim_start: self.trim_start,
            trim_end: self.trim_end,
            media_type: self.media_type.clone(),
            sort_order,
            filter_flag: self.filter_flag,
            size_bytes,
            duration_ms: self.duration_ms,
        }
    }

    /// File extension for the downloaded file.
    fn extension(&self) -> &str {
        let from_locator = self
            .locator()
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.bytes().all(|b| b.is_ascii_alphanumeric()));

        from_locator.unwrap_or_else(|| match self.media_type.as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            "video/x-matroska" => "mkv",
            "video/mp2t" => "ts",
            _ => "mp4",
        })
    }
}

/// One item of the desired offline list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredVideo {
    /// Already in the offline library; kept as is.
    Offline(VideoKey),
    /// To be downloaded when not yet persisted.
    Remote(RemoteVideo),
}

impl DesiredVideo {
    pub fn key(&self) -> &VideoKey {
        match self {
            DesiredVideo::Offline(key) => key,
            DesiredVideo::Remote(remote) => &remote.key,
        }
    }
}

/// Result of an orphan sweep over the storage directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files deleted
    pub removed: Vec<PathBuf>,
    /// Unreferenced files that could not be deleted
    pub failed: usize,
}

/// Diff-based synchronizer for the offline library.
pub struct OfflineSyncEngine {
    repo: Arc<dyn OfflineLibraryRepository>,
    http: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    storage_dir: PathBuf,
    flight: SingleFlight,
}

impl OfflineSyncEngine {
    /// Create a new engine.
    ///
    /// # Arguments
    ///
    /// * `repo` - Persisted offline rows
    /// * `http` - Client used to download new items
    /// * `fs` - File system bridge
    /// * `storage_dir` - Directory owning every offline file
    pub fn new(
        repo: Arc<dyn OfflineLibraryRepository>,
        http: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        storage_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            http,
            fs,
            storage_dir: storage_dir.into(),
            flight: SingleFlight::new(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Creates the storage directory.
    pub async fn initialize(&self) -> Result<()> {
        self.fs.create_dir_all(&self.storage_dir).await?;
        Ok(())
    }

    /// Whether a sync or cleanup currently holds the guard.
    pub fn is_running(&self) -> bool {
        self.flight.is_held()
    }

    /// Makes the offline library match `desired`.
    ///
    /// Returns `Ok(None)` without touching anything when another sync or
    /// cleanup is running. Otherwise returns the refreshed library ordered by
    /// `sort_order`.
    #[instrument(skip(self, desired, progress), fields(desired = desired.len()))]
    pub async fn set_offline_videos(
        &self,
        desired: &[DesiredVideo],
        progress: &dyn ProgressSink,
    ) -> Result<Option<Vec<OfflineEntry>>> {
        let Some(_guard) = self.flight.try_acquire() else {
            info!("Offline sync already running");
            return Ok(None);
        };

        let persisted = self.get_offline_videos().await?;
        let persisted_keys: HashSet<&VideoKey> = persisted.iter().map(|e| &e.video_key).collect();
        let desired_keys: HashSet<&VideoKey> = desired.iter().map(DesiredVideo::key).collect();

        let to_remove: Vec<&OfflineEntry> = persisted
            .iter()
            .filter(|entry| !desired_keys.contains(&entry.video_key))
            .collect();

        let mut seen = HashSet::new();
        let to_append: Vec<(usize, &RemoteVideo)> = desired
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                DesiredVideo::Remote(remote) => Some((index, remote)),
                DesiredVideo::Offline(key) => {
                    if !persisted_keys.contains(key) {
                        debug!(key = %key, "Desired offline item is not persisted; ignoring");
                    }
                    None
                }
            })
            .filter(|(_, remote)| !persisted_keys.contains(&remote.key))
            .filter(|(_, remote)| seen.insert(remote.key.clone()))
            .collect();

        info!(
            persisted = persisted.len(),
            remove = to_remove.len(),
            append = to_append.len(),
            "Offline sync planned"
        );

        self.unregister(&to_remove).await?;

        let mut tracker = ProgressTracker::new(progress, to_append.len());
        let mut registered = 0usize;
        for (position, (sort_order, remote)) in to_append.iter().enumerate() {
            tracker.begin_item(position, remote.display_name.clone(), None);
            match self.register(remote, *sort_order as i64, &mut tracker).await {
                Ok(()) => {
                    registered += 1;
                    tracker.finish_item(true);
                }
                Err(err) if err.is_item_failure() => {
                    warn!(key = %remote.key, error = %err, "Offline registration failed; skipping");
                    tracker.finish_item(false);
                }
                Err(err) => return Err(err),
            }
        }

        self.reorder(desired).await?;
        let cleanup = self.remove_orphans().await?;

        let library = self.repo.get_all_ordered().await?;
        info!(
            registered,
            failed = to_append.len() - registered,
            orphans = cleanup.removed.len(),
            total = library.len(),
            "Offline sync finished"
        );
        Ok(Some(library))
    }

    /// Persisted rows ordered by `sort_order`, after pruning missing files.
    pub async fn get_offline_videos(&self) -> Result<Vec<OfflineEntry>> {
        self.prune_missing_files().await?;
        Ok(self.repo.get_all_ordered().await?)
    }

    /// Deletes rows (with their chapters) whose file no longer exists and
    /// returns their keys.
    #[instrument(skip(self))]
    pub async fn prune_missing_files(&self) -> Result<Vec<VideoKey>> {
        let mut missing = Vec::new();
        for entry in self.repo.get_all_ordered().await? {
            if !self.fs.exists(&entry.file_path).await? {
                missing.push(entry.video_key);
            }
        }

        if !missing.is_empty() {
            self.repo.delete_with_chapters(&missing).await?;
            warn!(count = missing.len(), "Pruned offline entries with missing files");
        }
        Ok(missing)
    }

    /// Writes `filter_flag` and `sort_order` for rows whose stored values
    /// differ. Returns the number of rows written.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn update_filter(&self, updates: &[FilterUpdate]) -> Result<usize> {
        let stored: HashMap<VideoKey, (i64, i64)> = self
            .repo
            .get_all_ordered()
            .await?
            .into_iter()
            .map(|e| (e.video_key, (e.filter_flag, e.sort_order)))
            .collect();

        let changed: Vec<FilterUpdate> = updates
            .iter()
            .filter(|update| {
                stored
                    .get(&update.video_key)
                    .is_some_and(|&(flag, order)| flag != update.filter_flag || order != update.sort_order)
            })
            .cloned()
            .collect();

        if changed.is_empty() {
            return Ok(0);
        }
        Ok(self.repo.update_filter_and_sort(&changed).await?)
    }

    /// Deletes unreferenced files from the storage directory.
    ///
    /// Returns `None` when a sync is running.
    #[instrument(skip(self))]
    pub async fn cleanup(&self) -> Result<Option<CleanupReport>> {
        let Some(_guard) = self.flight.try_acquire() else {
            return Ok(None);
        };
        self.remove_orphans().await.map(Some)
    }

    /// Chapter rows of one entry ordered by position.
    pub async fn chapters(&self, key: &VideoKey) -> Result<Vec<ChapterEntry>> {
        Ok(self.repo.chapters_for(key).await?)
    }

    async fn unregister(&self, entries: &[&OfflineEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        for entry in entries {
            if !self.fs.delete_best_effort(&entry.file_path).await {
                warn!(key = %entry.video_key, "Could not delete offline file");
            }
        }

        let keys: Vec<VideoKey> = entries.iter().map(|e| e.video_key.clone()).collect();
        let removed = self.repo.delete_with_chapters(&keys).await?;
        debug!(removed, "Unregistered offline entries");
        Ok(())
    }

    async fn register(
        &self,
        remote: &RemoteVideo,
        sort_order: i64,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        remote
            .to_entry(self.storage_dir.clone(), sort_order, 0)
            .validate()
            .map_err(|message| SyncError::InvalidItem {
                key: remote.key.to_string(),
                message,
            })?;

        let file_path = self
            .fs
            .create_temp_file(&self.storage_dir, remote.extension())
            .await?;

        let outcome = self.download_and_insert(remote, sort_order, &file_path, tracker).await;
        if outcome.is_err() {
            self.fs.delete_best_effort(&file_path).await;
        }
        outcome
    }

    async fn download_and_insert(
        &self,
        remote: &RemoteVideo,
        sort_order: i64,
        file_path: &Path,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        let mut stream = self.http.fetch_bytes(remote.locator()).await?;
        tracker.set_total_bytes(stream.content_length);

        let mut writer = self.fs.open_write_stream(file_path).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = stream.reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            written += n as u64;
            tracker.add_bytes(n as u64);
        }
        writer.flush().await?;
        writer.shutdown().await?;

        if let Some(expected) = stream.content_length {
            if written != expected {
                return Err(SyncError::Download {
                    key: remote.key.to_string(),
                    message: format!("truncated body: {written} of {expected} bytes"),
                });
            }
        }

        let entry = remote.to_entry(file_path.to_path_buf(), sort_order, written);
        let chapters: Vec<ChapterEntry> = remote
            .chapters
            .iter()
            .map(|c| ChapterEntry {
                video_key: remote.key.clone(),
                position: c.position,
                label: c.label.clone(),
                skip: c.skip,
            })
            .collect();

        self.repo.insert_with_chapters(&entry, &chapters).await?;
        debug!(key = %remote.key, bytes = written, "Registered offline entry");
        Ok(())
    }

    async fn reorder(&self, desired: &[DesiredVideo]) -> Result<()> {
        let stored: HashMap<VideoKey, i64> = self
            .repo
            .get_all_ordered()
            .await?
            .into_iter()
            .map(|e| (e.video_key, e.sort_order))
            .collect();

        let mut seen = HashSet::new();
        let orders: Vec<(VideoKey, i64)> = desired
            .iter()
            .enumerate()
            .filter(|(_, item)| seen.insert(item.key()))
            .filter_map(|(index, item)| {
                let index = index as i64;
                match stored.get(item.key()) {
                    Some(&current) if current != index => Some((item.key().clone(), index)),
                    _ => None,
                }
            })
            .collect();

        if !orders.is_empty() {
            self.repo.update_sort_orders(&orders).await?;
            debug!(count = orders.len(), "Reordered offline entries");
        }
        Ok(())
    }

    async fn remove_orphans(&self) -> Result<CleanupReport> {
        let referenced: HashSet<PathBuf> = self
            .repo
            .get_all_ordered()
            .await?
            .into_iter()
            .map(|e| e.file_path)
            .collect();

        let mut report = CleanupReport::default();
        for path in self.fs.list_directory(&self.storage_dir).await? {
            if referenced.contains(&path) {
                continue;
            }
            match self.fs.metadata(&path).await {
                Ok(metadata) if metadata.is_directory => continue,
                Ok(_) => {}
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Skipping unreadable file");
                    continue;
                }
            }
            if self.fs.delete_best_effort(&path).await {
                report.removed.push(path);
            } else {
                report.failed += 1;
            }
        }

        if !report.removed.is_empty() {
            info!(removed = report.removed.len(), "Removed orphaned offline files");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_locator_suffix() {
        let remote = RemoteVideo::new("https://cdn.example.com/v/clip.webm?sig=abc", "Clip");
        assert_eq!(remote.extension(), "webm");
    }

    #[test]
    fn extension_falls_back_to_media_type() {
        let remote = RemoteVideo::new("https://cdn.example.com/stream/42", "Clip")
            .with_media_type("video/quicktime");
        assert_eq!(remote.extension(), "mov");

        let odd = RemoteVideo::new("https://cdn.example.com/v/file.tar-gz!", "Odd");
        assert_eq!(odd.extension(), "mp4");
    }

    #[test]
    fn desired_video_key() {
        let key = VideoKey::new("https://cdn.example.com/v/1.mp4");
        assert_eq!(DesiredVideo::Offline(key.clone()).key(), &key);
        assert_eq!(
            DesiredVideo::Remote(RemoteVideo::new("https://cdn.example.com/v/1.mp4", "One")).key(),
            &key
        );
    }
}
