//! A single cached video.
//!
//! A [`CacheEntry`] moves through `Empty -> Downloading -> Present`, falls back
//! to `Empty` with a sticky error when a download fails, and ends in the
//! terminal `Invalidated` state. Downloads run on a spawned task; any number of
//! callers can await the same download through [`CacheEntry::get_file`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use bridge_traits::{FileSystemAccess, HttpClient};
use core_async::io::{self, AsyncWriteExt};
use core_async::sync::{watch, CancellationToken, Mutex as AsyncMutex};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::key::CacheKey;
use crate::error::{PlaybackError, Result};

/// The registry's key -> entry table.
pub(crate) type EntryTable = AsyncMutex<HashMap<CacheKey, Arc<CacheEntry>>>;

#[derive(Debug)]
struct Attempt {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct EntryState {
    local_file: Option<PathBuf>,
    invalidated: bool,
    error: Option<Arc<PlaybackError>>,
    attempt: Option<Attempt>,
    next_attempt: u64,
}

/// One key's worth of cached content.
pub struct CacheEntry {
    key: CacheKey,
    locator: Option<String>,
    cache_dir: PathBuf,
    http: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    table: Weak<EntryTable>,
    ref_count: AtomicUsize,
    state: Mutex<EntryState>,
    downloading: watch::Sender<bool>,
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("ref_count", &self.ref_count())
            .field("downloading", &self.is_downloading())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl CacheEntry {
    pub(crate) fn new(
        key: CacheKey,
        locator: Option<String>,
        cache_dir: PathBuf,
        existing_file: Option<PathBuf>,
        http: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        table: Weak<EntryTable>,
    ) -> Self {
        let (downloading, _) = watch::channel(false);
        Self {
            key,
            locator,
            cache_dir,
            http,
            fs,
            table,
            ref_count: AtomicUsize::new(0),
            state: Mutex::new(EntryState {
                local_file: existing_file,
                ..EntryState::default()
            }),
            downloading,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    /// Path the content lives at once downloaded.
    pub fn file_path(&self) -> PathBuf {
        self.cache_dir.join(self.key.as_str())
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn is_downloading(&self) -> bool {
        *self.downloading.borrow()
    }

    pub fn is_invalidated(&self) -> bool {
        self.state.lock().invalidated
    }

    /// The downloaded file, without starting a download.
    pub fn local_file(&self) -> Option<PathBuf> {
        let state = self.state.lock();
        if state.invalidated {
            None
        } else {
            state.local_file.clone()
        }
    }

    /// Returns the local file, downloading it first if needed.
    ///
    /// Starts a download when none is in flight, then waits for the in-flight
    /// one. Returns `None` when the download fails, is cancelled or the entry
    /// is invalidated; [`error`](Self::error) tells failures apart.
    pub async fn get_file(self: &Arc<Self>) -> Option<PathBuf> {
        {
            let mut state = self.state.lock();
            if state.invalidated {
                return None;
            }
            if let Some(file) = &state.local_file {
                return Some(file.clone());
            }
            if state.attempt.is_none() {
                self.start_download(&mut state);
            }
        }

        let mut rx = self.downloading.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|downloading| !*downloading).await;

        self.local_file()
    }

    /// Takes a reference. An entry at zero comes back to one.
    ///
    /// The sweep checks references under the registry lock, so only
    /// [`CacheRegistry::get_cache`](super::CacheRegistry::get_cache) is
    /// guaranteed to pin the file. A reference taken here on an entry from
    /// `peek_cache` or `get_or_create_cache` can race a running sweep; the
    /// entry then survives but its file may be gone, and `get_file()`
    /// downloads it again.
    pub fn add_ref(&self) -> usize {
        self.ref_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops a reference, clamping at zero.
    pub fn release(&self) -> usize {
        let previous = self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        if previous == 0 {
            error!(key = %self.key, "release() on an entry with no references");
        }
        previous.saturating_sub(1)
    }

    /// Cancels the in-flight download, if any, without recording an error.
    ///
    /// Waiters resume and see no file. A later `get_file()` starts over.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if let Some(attempt) = state.attempt.take() {
            debug!(key = %self.key, attempt = attempt.id, "Cancelling download");
            attempt.token.cancel();
        }
        self.downloading.send_replace(false);
    }

    /// Marks the entry unusable, removes it from the registry and deletes its file.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn invalidate(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.invalidated = true;
            state.local_file = None;
            if let Some(attempt) = state.attempt.take() {
                attempt.token.cancel();
            }
            self.downloading.send_replace(false);
        }

        // The file goes under the table lock so no lookup can adopt it in
        // between. A newer entry for the same key owns the file instead.
        let Some(table) = self.table.upgrade() else {
            self.fs.delete_best_effort(&self.file_path()).await;
            info!("Cache entry invalidated");
            return;
        };
        let mut table = table.lock().await;
        match table.get(&self.key) {
            Some(current) if !Arc::ptr_eq(current, self) => {
                debug!("Key already reassigned; keeping its file");
            }
            Some(_) => {
                table.remove(&self.key);
                self.fs.delete_best_effort(&self.file_path()).await;
            }
            None => {
                self.fs.delete_best_effort(&self.file_path()).await;
            }
        }
        drop(table);
        info!("Cache entry invalidated");
    }

    /// The sticky error of the last failed download.
    pub fn error(&self) -> Option<Arc<PlaybackError>> {
        self.state.lock().error.clone()
    }

    pub fn reset_error(&self) {
        self.state.lock().error = None;
    }

    /// Forgets the local file after the sweep deleted it.
    pub(crate) fn mark_evicted(&self) {
        self.state.lock().local_file = None;
    }

    fn start_download(self: &Arc<Self>, state: &mut EntryState) {
        let id = state.next_attempt;
        state.next_attempt += 1;
        let token = CancellationToken::new();
        state.attempt = Some(Attempt {
            id,
            token: token.clone(),
        });
        self.downloading.send_replace(true);

        debug!(key = %self.key, attempt = id, "Starting download");
        let entry = Arc::clone(self);
        core_async::task::spawn(async move { entry.run_attempt(id, token).await });
    }

    async fn run_attempt(self: Arc<Self>, id: u64, token: CancellationToken) {
        let temp = self.cache_dir.join(format!(
            "{}.{}.part",
            self.key,
            Uuid::new_v4().simple()
        ));

        let outcome = token.run_until_cancelled(self.download_to(&temp)).await;
        match outcome {
            None => {
                debug!(key = %self.key, attempt = id, "Download cancelled");
                self.fs.delete_best_effort(&temp).await;
            }
            Some(Ok(bytes)) => self.publish(id, &token, &temp, bytes).await,
            Some(Err(err)) => {
                self.fs.delete_best_effort(&temp).await;
                self.fail(id, err);
            }
        }
    }

    async fn download_to(&self, temp: &Path) -> Result<u64> {
        let locator = self.locator.as_deref().ok_or_else(|| PlaybackError::DownloadFailed {
            key: self.key.to_string(),
            message: "entry has no source locator".to_string(),
        })?;

        let mut stream = self.http.fetch_bytes(locator).await?;
        let mut writer = self.fs.open_write_stream(temp).await?;
        let written = io::copy(&mut stream.reader, &mut writer).await?;
        writer.flush().await?;
        writer.shutdown().await?;

        if let Some(expected) = stream.content_length {
            if written != expected {
                return Err(PlaybackError::DownloadFailed {
                    key: self.key.to_string(),
                    message: format!("truncated body: {written} of {expected} bytes"),
                });
            }
        }
        Ok(written)
    }

    async fn publish(&self, id: u64, token: &CancellationToken, temp: &Path, bytes: u64) {
        if token.is_cancelled() || !self.is_current(id) {
            self.fs.delete_best_effort(temp).await;
            return;
        }

        let target = self.file_path();
        if let Err(err) = self.fs.rename(temp, &target).await {
            self.fs.delete_best_effort(temp).await;
            self.fail(id, err.into());
            return;
        }

        let invalidated = {
            let mut state = self.state.lock();
            if state.attempt.as_ref().is_some_and(|a| a.id == id) {
                state.attempt = None;
                if !state.invalidated {
                    state.local_file = Some(target.clone());
                }
                self.downloading.send_replace(false);
            }
            state.invalidated
        };

        if invalidated {
            self.fs.delete_best_effort(&target).await;
        } else {
            info!(key = %self.key, bytes, "Download complete");
        }
    }

    fn fail(&self, id: u64, err: PlaybackError) {
        let mut state = self.state.lock();
        if !state.attempt.as_ref().is_some_and(|a| a.id == id) {
            return;
        }
        warn!(key = %self.key, error = %err, "Download failed");
        state.attempt = None;
        if state.error.is_none() {
            state.error = Some(Arc::new(err));
        }
        self.downloading.send_replace(false);
    }

    fn is_current(&self, id: u64) -> bool {
        self.state
            .lock()
            .attempt
            .as_ref()
            .is_some_and(|a| a.id == id)
    }
}
