//! Registry of cache entries and the eviction sweep.
//!
//! The registry owns the key -> entry table. Every table mutation happens
//! under one async mutex, which is also held while the sweep decides what to
//! evict, so an entry can never gain a reference halfway through eviction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bridge_traits::{FileSystemAccess, HttpClient};
use core_async::sync::SingleFlight;
use tracing::{debug, info, instrument, warn};

use super::config::CacheConfig;
use super::entry::{CacheEntry, EntryTable};
use super::key::CacheKey;
use super::stats::{CacheStats, SweepReport};
use crate::error::{PlaybackError, Result};

/// Explicitly constructed owner of all cache entries.
///
/// # Example
///
/// ```rust,ignore
/// let registry = CacheRegistry::new(CacheConfig::new(cache_dir), http, fs)?;
/// registry.initialize().await?;
///
/// let entry = registry.get_cache("https://cdn.example.com/v/1.mp4", None).await?;
/// if let Some(path) = entry.get_file().await {
///     player.open(path);
/// }
/// entry.release();
/// ```
pub struct CacheRegistry {
    config: CacheConfig,
    http: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    table: Arc<EntryTable>,
    sweeping: SingleFlight,
    initialized: AtomicBool,
}

struct CachedFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

impl CacheRegistry {
    /// Create a new registry.
    ///
    /// # Arguments
    ///
    /// * `config` - Directory and budget settings
    /// * `http` - Client used by entry downloads
    /// * `fs` - File system bridge for the cache directory
    pub fn new(
        config: CacheConfig,
        http: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        Ok(Self {
            config,
            http,
            fs,
            table: Arc::new(EntryTable::default()),
            sweeping: SingleFlight::new(),
            initialized: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Creates the cache directory and removes partial downloads left behind
    /// by a previous run.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let dir = &self.config.cache_directory;
        self.fs.create_dir_all(dir).await?;

        let mut stale = 0usize;
        for path in self.fs.list_directory(dir).await? {
            let is_part = path.extension().is_some_and(|ext| ext == "part");
            if is_part && self.fs.delete_best_effort(&path).await {
                stale += 1;
            }
        }

        self.initialized.store(true, Ordering::Release);
        info!(stale_partials = stale, "Cache registry initialized");
        Ok(())
    }

    /// Cancels every in-flight download and empties the table.
    #[instrument(skip(self))]
    pub async fn dispose(&self) {
        self.initialized.store(false, Ordering::Release);
        let mut table = self.table.lock().await;
        for entry in table.values() {
            entry.cancel();
        }
        let dropped = table.len();
        table.clear();
        info!(entries = dropped, "Cache registry disposed");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Returns the entry for `locator`, creating it if needed.
    ///
    /// A file already on disk for the key is adopted and its modification time
    /// bumped so the next sweep treats it as recently used.
    pub async fn get_or_create_cache(
        &self,
        locator: &str,
        key: Option<CacheKey>,
    ) -> Result<Arc<CacheEntry>> {
        let mut table = self.table.lock().await;
        self.lookup_or_insert(&mut table, locator, key).await
    }

    /// Like [`get_or_create_cache`](Self::get_or_create_cache), but takes a
    /// reference and then sweeps.
    #[instrument(skip(self, key))]
    pub async fn get_cache(&self, locator: &str, key: Option<CacheKey>) -> Result<Arc<CacheEntry>> {
        let entry = {
            let mut table = self.table.lock().await;
            let entry = self.lookup_or_insert(&mut table, locator, key).await?;
            entry.add_ref();
            entry
        };

        if let Err(err) = self.sweep().await {
            warn!(error = %err, "Cache sweep failed");
        }
        Ok(entry)
    }

    /// Table lookup only; never touches the disk.
    pub async fn peek_cache(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.table.lock().await.get(key).cloned()
    }

    async fn lookup_or_insert(
        &self,
        table: &mut HashMap<CacheKey, Arc<CacheEntry>>,
        locator: &str,
        key: Option<CacheKey>,
    ) -> Result<Arc<CacheEntry>> {
        if !self.is_initialized() {
            return Err(PlaybackError::NotInitialized);
        }

        let key = key.unwrap_or_else(|| CacheKey::derive(locator));
        if let Some(entry) = table.get(&key) {
            return Ok(Arc::clone(entry));
        }

        let path = self.config.cache_directory.join(key.as_str());
        let existing = if self.fs.exists(&path).await? {
            if let Err(err) = self.fs.touch(&path).await {
                warn!(key = %key, error = %err, "Failed to touch cached file");
            }
            debug!(key = %key, "Adopted cached file from disk");
            Some(path)
        } else {
            None
        };

        let entry = Arc::new(CacheEntry::new(
            key.clone(),
            Some(locator.to_string()),
            self.config.cache_directory.clone(),
            existing,
            Arc::clone(&self.http),
            Arc::clone(&self.fs),
            Arc::downgrade(&self.table),
        ));
        table.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    /// Evicts old, unreferenced files until the cache fits its budget.
    ///
    /// Returns [`SweepReport::skipped`] when another sweep is running.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let Some(_guard) = self.sweeping.try_acquire() else {
            debug!("Sweep already running");
            return Ok(SweepReport::skipped());
        };

        let dir = &self.config.cache_directory;
        let mut files = self.list_files().await?;
        let mut count = files.len();
        let mut total: u64 = files.iter().map(|f| f.size).sum();

        let disk = self.fs.disk_space(dir).await?;
        let budget = self.config.byte_budget(disk.total, disk.available, total);
        let max_files = self.config.max_file_count;

        let mut report = SweepReport {
            files_before: count,
            bytes_before: total,
            byte_budget: budget,
            ..SweepReport::default()
        };

        if count < max_files && total < budget {
            return Ok(report);
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified));

        let mut table = self.table.lock().await;
        for file in files.iter().rev() {
            if count < max_files && total < budget {
                break;
            }

            let key = file
                .path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(CacheKey::from_file_name);
            let entry = key.as_ref().and_then(|k| table.get(k)).cloned();

            if let Some(entry) = &entry {
                if entry.ref_count() > 0 || entry.is_downloading() {
                    report.retained_in_use += 1;
                    continue;
                }
            }

            if !self.fs.delete_best_effort(&file.path).await {
                continue;
            }
            count -= 1;
            total = total.saturating_sub(file.size);
            report.evicted_files += 1;
            report.evicted_bytes += file.size;

            if let (Some(key), Some(entry)) = (key, entry) {
                if file.path == entry.file_path() {
                    entry.mark_evicted();
                    // Referenced during the delete: keep it so the holder and
                    // later lookups share one entry. Its next get_file()
                    // downloads again.
                    if entry.ref_count() == 0 {
                        table.remove(&key);
                    }
                }
            }
        }

        info!(
            evicted = report.evicted_files,
            bytes = report.evicted_bytes,
            retained = report.retained_in_use,
            "Cache sweep finished"
        );
        Ok(report)
    }

    /// Counts of entries in the table and files on disk.
    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        {
            let table = self.table.lock().await;
            stats.entries = table.len();
            for entry in table.values() {
                if entry.ref_count() > 0 {
                    stats.referenced_entries += 1;
                }
                if entry.is_downloading() {
                    stats.downloading_entries += 1;
                }
            }
        }

        let files = self.list_files().await?;
        stats.files_on_disk = files.len();
        stats.bytes_on_disk = files.iter().map(|f| f.size).sum();
        Ok(stats)
    }

    async fn list_files(&self) -> Result<Vec<CachedFile>> {
        let mut files = Vec::new();
        for path in self.fs.list_directory(&self.config.cache_directory).await? {
            let metadata = match self.fs.metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    // Vanished between listing and stat.
                    debug!(path = %path.display(), error = %err, "Skipping unreadable file");
                    continue;
                }
            };
            if metadata.is_directory {
                continue;
            }
            files.push(CachedFile {
                path,
                size: metadata.size,
                modified: metadata.modified_at.unwrap_or(UNIX_EPOCH),
            });
        }
        Ok(files)
    }
}
