//! Tests for the content cache registry and entries
//!
//! The registry runs against the real `TokioFileSystem` inside a temp
//! directory, optionally wrapped so deletes or disk queries block until the
//! test lets them through. HTTP is either a mockall mock or a gated fake that
//! holds the download open until the test lets it finish.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteStream, HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::{DiskSpace, FileMetadata};
use bridge_traits::FileSystemAccess;
use bytes::Bytes;
use core_async::sync::Semaphore;
use core_playback::cache::{CacheConfig, CacheEntry, CacheKey, CacheRegistry};
use core_playback::PlaybackError;
use filetime::FileTime;
use mockall::mock;
use tempfile::TempDir;

mock! {
    Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn fetch_bytes(&self, locator: &str) -> BridgeResult<ByteStream>;
    }
}

/// Serves `body` once a permit is added to `gate`.
struct GatedHttp {
    gate: Semaphore,
    calls: AtomicUsize,
    body: &'static [u8],
}

impl GatedHttp {
    fn new(body: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            body,
        })
    }
}

#[async_trait]
impl HttpClient for GatedHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("execute".into()))
    }

    async fn fetch_bytes(&self, _locator: &str) -> BridgeResult<ByteStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        permit.forget();
        Ok(ByteStream::from_bytes(self.body))
    }
}

/// `TokioFileSystem` whose deletes and disk queries can be held at a gate.
struct GatedFs {
    inner: TokioFileSystem,
    hold_deletes: AtomicBool,
    hold_disk_space: AtomicBool,
    gate: Semaphore,
    held: AtomicUsize,
}

impl GatedFs {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: TokioFileSystem::new(),
            hold_deletes: AtomicBool::new(false),
            hold_disk_space: AtomicBool::new(false),
            gate: Semaphore::new(0),
            held: AtomicUsize::new(0),
        })
    }

    async fn pass(&self, hold: &AtomicBool) {
        if hold.load(Ordering::SeqCst) {
            self.held.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
        }
    }

    async fn wait_until_held(&self, calls: usize) {
        while self.held.load(Ordering::SeqCst) < calls {
            core_async::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl FileSystemAccess for GatedFs {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        self.inner.exists(path).await
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        self.inner.metadata(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.inner.create_dir_all(path).await
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.inner.write_file(path, data).await
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.inner.delete_file(path).await
    }

    async fn delete_best_effort(&self, path: &Path) -> bool {
        self.pass(&self.hold_deletes).await;
        self.inner.delete_best_effort(path).await
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        self.inner.list_directory(path).await
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> BridgeResult<Box<dyn core_async::io::AsyncWrite + Send + Unpin>> {
        self.inner.open_write_stream(path).await
    }

    async fn create_temp_file(&self, dir: &Path, extension: &str) -> BridgeResult<PathBuf> {
        self.inner.create_temp_file(dir, extension).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> BridgeResult<()> {
        self.inner.rename(from, to).await
    }

    async fn touch(&self, path: &Path) -> BridgeResult<()> {
        self.inner.touch(path).await
    }

    async fn disk_space(&self, path: &Path) -> BridgeResult<DiskSpace> {
        self.pass(&self.hold_disk_space).await;
        self.inner.disk_space(path).await
    }
}

struct Fixture {
    _dir: TempDir,
    cache_dir: PathBuf,
    registry: CacheRegistry,
}

async fn fixture(http: Arc<dyn HttpClient>, config: impl FnOnce(CacheConfig) -> CacheConfig) -> Fixture {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("video-cache");
    let fs = Arc::new(TokioFileSystem::new());
    let registry = CacheRegistry::new(config(CacheConfig::new(&cache_dir)), http, fs).unwrap();
    registry.initialize().await.unwrap();
    Fixture {
        _dir: dir,
        cache_dir,
        registry,
    }
}

struct GatedFixture {
    _dir: TempDir,
    cache_dir: PathBuf,
    fs: Arc<GatedFs>,
    registry: Arc<CacheRegistry>,
}

async fn gated_fixture(
    http: Arc<dyn HttpClient>,
    config: impl FnOnce(CacheConfig) -> CacheConfig,
) -> GatedFixture {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("video-cache");
    let fs = GatedFs::new();
    let registry = CacheRegistry::new(config(CacheConfig::new(&cache_dir)), http, fs.clone()).unwrap();
    registry.initialize().await.unwrap();
    GatedFixture {
        _dir: dir,
        cache_dir,
        fs,
        registry: Arc::new(registry),
    }
}

fn serving(body: &'static [u8]) -> MockHttp {
    let mut http = MockHttp::new();
    http.expect_fetch_bytes()
        .returning(move |_| Ok(ByteStream::from_bytes(body)));
    http
}

fn write_aged(dir: &Path, locator: &str, bytes: &[u8], age_secs: u64) -> PathBuf {
    let path = dir.join(CacheKey::derive(locator).as_str());
    std::fs::write(&path, bytes).unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(age_secs);
    filetime::set_file_mtime(&path, FileTime::from_system_time(mtime)).unwrap();
    path
}

async fn wait_until_downloading(entry: &CacheEntry) {
    while !entry.is_downloading() {
        core_async::sleep(Duration::from_millis(1)).await;
    }
}

#[core_async::test]
async fn get_cache_shares_one_entry_and_counts_references() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c).await;
    let locator = "https://cdn.example.com/v/1.mp4";

    let first = fx.registry.get_cache(locator, None).await.unwrap();
    let second = fx.registry.get_cache(locator, None).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.ref_count(), 2);
    assert_eq!(first.release(), 1);
    assert_eq!(second.ref_count(), 1);
}

#[core_async::test]
async fn release_clamps_at_zero_and_add_ref_recovers() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c).await;
    let entry = fx
        .registry
        .get_or_create_cache("https://cdn.example.com/v/2.mp4", None)
        .await
        .unwrap();

    assert_eq!(entry.ref_count(), 0);
    assert_eq!(entry.release(), 0);
    assert_eq!(entry.add_ref(), 1);
}

#[core_async::test]
async fn explicit_key_overrides_derivation() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c).await;
    let key = CacheKey::derive("canonical");

    let entry = fx
        .registry
        .get_cache("https://cdn.example.com/v/3.mp4?token=abc", Some(key.clone()))
        .await
        .unwrap();

    assert_eq!(entry.key(), &key);
    assert!(fx.registry.peek_cache(&key).await.is_some());
    assert!(fx
        .registry
        .peek_cache(&CacheKey::derive("https://cdn.example.com/v/3.mp4?token=abc"))
        .await
        .is_none());
}

#[core_async::test]
async fn get_file_downloads_once_and_publishes_under_the_key() {
    let mut http = MockHttp::new();
    http.expect_fetch_bytes()
        .times(1)
        .returning(|_| Ok(ByteStream::from_bytes(&b"video bytes"[..])));
    let fx = fixture(Arc::new(http), |c| c).await;

    let entry = fx
        .registry
        .get_cache("https://cdn.example.com/v/4.mp4", None)
        .await
        .unwrap();

    let path = entry.get_file().await.expect("downloaded");
    assert_eq!(path, fx.cache_dir.join(entry.key().as_str()));
    assert_eq!(std::fs::read(&path).unwrap(), b"video bytes");
    assert!(!entry.is_downloading());

    // second call is served from disk
    assert_eq!(entry.get_file().await, Some(path));
}

#[core_async::test]
async fn concurrent_waiters_share_one_download() {
    let http = GatedHttp::new(b"shared");
    let fx = fixture(http.clone(), |c| c).await;
    let entry = fx
        .registry
        .get_cache("https://cdn.example.com/v/5.mp4", None)
        .await
        .unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let entry = Arc::clone(&entry);
            core_async::spawn(async move { entry.get_file().await })
        })
        .collect();

    wait_until_downloading(&entry).await;
    http.gate.add_permits(1);

    for waiter in waiters {
        let path = waiter.await.unwrap().expect("every waiter sees the file");
        assert_eq!(std::fs::read(path).unwrap(), b"shared");
    }
    assert_eq!(http.calls.load(Ordering::SeqCst), 1);
}

#[core_async::test]
async fn failed_download_sets_sticky_error() {
    let mut http = MockHttp::new();
    http.expect_fetch_bytes().returning(|locator| {
        Err(BridgeError::HttpStatus {
            status: 404,
            locator: locator.to_string(),
        })
    });
    let fx = fixture(Arc::new(http), |c| c).await;
    let entry = fx
        .registry
        .get_cache("https://cdn.example.com/v/missing.mp4", None)
        .await
        .unwrap();

    assert_eq!(entry.get_file().await, None);
    let err = entry.error().expect("error recorded");
    assert!(matches!(
        err.as_ref(),
        PlaybackError::Bridge(BridgeError::HttpStatus { status: 404, .. })
    ));

    // first error wins until reset
    assert_eq!(entry.get_file().await, None);
    assert!(entry.error().is_some());
    entry.reset_error();
    assert!(entry.error().is_none());

    let leftovers = std::fs::read_dir(&fx.cache_dir).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[core_async::test]
async fn cancel_wakes_waiters_without_error() {
    let http = GatedHttp::new(b"never");
    let fx = fixture(http.clone(), |c| c).await;
    let entry = fx
        .registry
        .get_cache("https://cdn.example.com/v/6.mp4", None)
        .await
        .unwrap();

    let waiter = {
        let entry = Arc::clone(&entry);
        core_async::spawn(async move { entry.get_file().await })
    };
    wait_until_downloading(&entry).await;

    entry.cancel();

    assert_eq!(waiter.await.unwrap(), None);
    assert!(entry.error().is_none());
    assert!(!entry.is_downloading());

    // a later call starts a fresh attempt
    let retry = {
        let entry = Arc::clone(&entry);
        core_async::spawn(async move { entry.get_file().await })
    };
    wait_until_downloading(&entry).await;
    http.gate.add_permits(1);
    assert!(retry.await.unwrap().is_some());
    assert_eq!(http.calls.load(Ordering::SeqCst), 2);
}

#[core_async::test]
async fn invalidate_removes_entry_and_file() {
    let fx = fixture(Arc::new(serving(b"doomed")), |c| c).await;
    let entry = fx
        .registry
        .get_cache("https://cdn.example.com/v/7.mp4", None)
        .await
        .unwrap();
    let path = entry.get_file().await.unwrap();

    entry.invalidate().await;

    assert!(entry.is_invalidated());
    assert!(fx.registry.peek_cache(entry.key()).await.is_none());
    assert!(!path.exists());
    assert_eq!(entry.get_file().await, None);
}

#[core_async::test]
async fn invalidated_file_is_never_adopted_by_a_new_entry() {
    let fx = gated_fixture(Arc::new(serving(b"payload")), |c| c).await;
    let locator = "https://cdn.example.com/v/10.mp4";
    let first = fx.registry.get_cache(locator, None).await.unwrap();
    let path = first.get_file().await.unwrap();

    fx.fs.hold_deletes.store(true, Ordering::SeqCst);
    let invalidating = {
        let first = Arc::clone(&first);
        core_async::spawn(async move { first.invalidate().await })
    };
    fx.fs.wait_until_held(1).await;

    let lookup = {
        let registry = Arc::clone(&fx.registry);
        core_async::spawn(async move { registry.get_or_create_cache(locator, None).await })
    };
    core_async::sleep(Duration::from_millis(20)).await;
    fx.fs.hold_deletes.store(false, Ordering::SeqCst);
    fx.fs.gate.add_permits(1);

    invalidating.await.unwrap();
    let second = lookup.await.unwrap().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.local_file(), None);
    let fresh = second.get_file().await.expect("downloaded again");
    assert_eq!(fresh, path);
    assert_eq!(std::fs::read(&fresh).unwrap(), b"payload");
}

#[core_async::test]
async fn existing_file_is_adopted_and_touched() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c).await;
    let locator = "https://cdn.example.com/v/8.mp4";
    let path = write_aged(&fx.cache_dir, locator, b"already here", 3_600);
    let before = std::fs::metadata(&path).unwrap().modified().unwrap();

    let entry = fx.registry.get_or_create_cache(locator, None).await.unwrap();

    assert_eq!(entry.local_file(), Some(path.clone()));
    assert_eq!(entry.get_file().await, Some(path.clone()));
    let after = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert!(after > before);
}

#[core_async::test]
async fn sweep_evicts_oldest_unreferenced_files() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c.with_max_files(3)).await;
    let dir = fx.cache_dir.clone();

    // Take a reference on the oldest file before aging it again.
    let pinned = fx
        .registry
        .get_or_create_cache("video-a", None)
        .await
        .unwrap();
    pinned.add_ref();

    let a = write_aged(&dir, "video-a", b"aaaa", 400);
    let b = write_aged(&dir, "video-b", b"bbbb", 300);
    let c = write_aged(&dir, "video-c", b"cccc", 200);
    let d = write_aged(&dir, "video-d", b"dddd", 100);

    let report = fx.registry.sweep().await.unwrap();

    assert!(!report.skipped);
    assert_eq!(report.files_before, 4);
    assert_eq!(report.evicted_files, 2);
    assert_eq!(report.retained_in_use, 1);
    assert!(a.exists(), "referenced file must survive");
    assert!(!b.exists());
    assert!(!c.exists());
    assert!(d.exists());
}

#[core_async::test]
async fn sweep_respects_the_byte_cap() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c.with_max_bytes(10)).await;
    let dir = fx.cache_dir.clone();

    let old = write_aged(&dir, "old", &[0u8; 6], 300);
    let new = write_aged(&dir, "new", &[0u8; 6], 100);
    let stray = dir.join("notes.txt");
    std::fs::write(&stray, b"x").unwrap();
    filetime::set_file_mtime(
        &stray,
        FileTime::from_system_time(SystemTime::now() - Duration::from_secs(50)),
    )
    .unwrap();

    let report = fx.registry.sweep().await.unwrap();

    assert_eq!(report.bytes_before, 13);
    assert_eq!(report.byte_budget, 10);
    assert_eq!(report.evicted_files, 1);
    assert!(!old.exists());
    assert!(new.exists());
    assert!(stray.exists());
}

#[core_async::test]
async fn sweep_drops_evicted_entries_from_the_table() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c.with_max_files(1)).await;
    let dir = fx.cache_dir.clone();
    write_aged(&dir, "gone", b"1", 300);
    write_aged(&dir, "kept", b"2", 100);

    let idle = fx.registry.get_or_create_cache("gone", None).await.unwrap();
    let path = write_aged(&dir, "gone", b"1", 300);

    fx.registry.sweep().await.unwrap();

    assert!(!path.exists());
    assert_eq!(idle.local_file(), None);
    assert!(fx.registry.peek_cache(idle.key()).await.is_none());
}

#[core_async::test]
async fn overlapping_sweep_is_skipped() {
    let fx = gated_fixture(Arc::new(MockHttp::new()), |c| c.with_max_files(2)).await;
    let old = write_aged(&fx.cache_dir, "old", b"1", 300);
    let new = write_aged(&fx.cache_dir, "new", b"2", 100);

    fx.fs.hold_disk_space.store(true, Ordering::SeqCst);
    let running = {
        let registry = Arc::clone(&fx.registry);
        core_async::spawn(async move { registry.sweep().await })
    };
    fx.fs.wait_until_held(1).await;

    let overlapping = fx.registry.sweep().await.unwrap();
    assert!(overlapping.skipped);
    assert_eq!(overlapping.evicted_files, 0);
    assert!(old.exists());
    assert!(new.exists());

    fx.fs.gate.add_permits(1);
    let report = running.await.unwrap().unwrap();
    assert!(!report.skipped);
    assert_eq!(report.evicted_files, 1);
    assert!(!old.exists());
    assert!(new.exists());
}

#[core_async::test]
async fn reference_taken_during_eviction_keeps_the_entry() {
    let fx = gated_fixture(Arc::new(serving(b"refetched")), |c| c.with_max_files(1)).await;
    let locator = "https://cdn.example.com/v/11.mp4";
    write_aged(&fx.cache_dir, locator, b"stale", 300);
    let entry = fx.registry.get_or_create_cache(locator, None).await.unwrap();
    assert!(entry.local_file().is_some());

    fx.fs.hold_deletes.store(true, Ordering::SeqCst);
    let sweeping = {
        let registry = Arc::clone(&fx.registry);
        core_async::spawn(async move { registry.sweep().await })
    };
    fx.fs.wait_until_held(1).await;
    entry.add_ref();
    fx.fs.hold_deletes.store(false, Ordering::SeqCst);
    fx.fs.gate.add_permits(1);

    let report = sweeping.await.unwrap().unwrap();
    assert_eq!(report.evicted_files, 1);
    assert_eq!(entry.local_file(), None);
    let kept = fx.registry.peek_cache(entry.key()).await.expect("still registered");
    assert!(Arc::ptr_eq(&kept, &entry));

    let path = entry.get_file().await.expect("downloaded again");
    assert_eq!(std::fs::read(path).unwrap(), b"refetched");
}

#[core_async::test]
async fn sweep_under_budget_is_a_no_op() {
    let fx = fixture(Arc::new(MockHttp::new()), |c| c).await;
    let path = write_aged(&fx.cache_dir, "small", b"tiny", 10);

    let report = fx.registry.sweep().await.unwrap();

    assert_eq!(report.files_before, 1);
    assert_eq!(report.evicted_files, 0);
    assert!(path.exists());
}

#[core_async::test]
async fn registry_requires_initialize() {
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(TokioFileSystem::new());
    let registry = CacheRegistry::new(
        CacheConfig::new(dir.path().join("c")),
        Arc::new(MockHttp::new()),
        fs,
    )
    .unwrap();

    let err = registry.get_cache("x", None).await.unwrap_err();
    assert!(matches!(err, PlaybackError::NotInitialized));
}

#[core_async::test]
async fn initialize_clears_partial_downloads() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("c");
    std::fs::create_dir_all(&cache_dir).unwrap();
    let part = cache_dir.join(format!("{}.abc.part", CacheKey::derive("x")));
    std::fs::write(&part, b"half").unwrap();

    let fs = Arc::new(TokioFileSystem::new());
    let registry =
        CacheRegistry::new(CacheConfig::new(&cache_dir), Arc::new(MockHttp::new()), fs).unwrap();
    registry.initialize().await.unwrap();

    assert!(!part.exists());
}

#[core_async::test]
async fn dispose_cancels_and_clears() {
    let http = GatedHttp::new(b"slow");
    let fx = fixture(http.clone(), |c| c).await;
    let entry = fx
        .registry
        .get_cache("https://cdn.example.com/v/9.mp4", None)
        .await
        .unwrap();
    let waiter = {
        let entry = Arc::clone(&entry);
        core_async::spawn(async move { entry.get_file().await })
    };
    wait_until_downloading(&entry).await;

    let stats = fx.registry.stats().await.unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.referenced_entries, 1);
    assert_eq!(stats.downloading_entries, 1);

    fx.registry.dispose().await;

    assert_eq!(waiter.await.unwrap(), None);
    assert!(fx.registry.peek_cache(entry.key()).await.is_none());
    assert!(!fx.registry.is_initialized());
}

#[core_async::test]
async fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    let result = CacheRegistry::new(
        CacheConfig::new(dir.path().join("c")).with_max_files(0),
        Arc::new(MockHttp::new()),
        fs,
    );
    assert!(matches!(result, Err(PlaybackError::InvalidConfig(_))));
}
