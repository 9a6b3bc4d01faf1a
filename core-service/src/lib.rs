//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] into the shared Rust core: it
//! opens the offline library database, builds the content cache registry and
//! the offline sync engine, and exposes the operations host applications call.
//! Desktop apps typically enable the `desktop-shims` feature and use
//! [`bootstrap_desktop`]; mobile hosts inject their own bridges through the
//! config builder and call [`CoreService::init`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
use core_library::{
    FilterUpdate, KeyValueRepository, OfflineEntry, OfflineLibraryRepository, SqliteAdapter,
    SqliteKeyValueRepository, SqliteOfflineLibraryRepository, VideoKey,
};
use core_playback::{CacheConfig, CacheEntry, CacheKey, CacheRegistry, CachedVideoItem, PlayableMedia};
use core_runtime::CoreConfig;
use core_sync::{CleanupReport, DesiredVideo, OfflineSyncEngine, ProgressSink};
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
///
/// ```ignore
/// let core = CoreService::init(config).await?;
///
/// let entry = core.get_cache("https://cdn.example.com/v/1.mp4", None).await?;
/// let file = entry.get_file().await;
/// entry.release();
///
/// core.dispose().await;
/// ```
pub struct CoreService {
    config: CoreConfig,
    cache: Arc<CacheRegistry>,
    engine: Arc<OfflineSyncEngine>,
    library: Arc<dyn OfflineLibraryRepository>,
    settings: Arc<dyn KeyValueRepository>,
    disposed: AtomicBool,
}

impl CoreService {
    /// Opens the SQLite library at `config.database_path` and starts the core.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn init(config: CoreConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                config.file_system.create_dir_all(parent).await?;
            }
        }

        let mut adapter = SqliteAdapter::new(DatabaseConfig::new(&config.database_path)).await?;
        adapter.initialize().await?;
        Self::with_database(config, Arc::new(adapter)).await
    }

    /// Starts the core on a host-provided, already initialized database.
    pub async fn with_database(config: CoreConfig, db: Arc<dyn DatabaseAdapter>) -> Result<Self> {
        config.validate()?;
        db.health_check().await?;

        let cache_config = CacheConfig::new(&config.cache_dir)
            .with_max_bytes(config.cache_max_bytes)
            .with_max_files(config.cache_max_files);
        let cache = Arc::new(CacheRegistry::new(
            cache_config,
            Arc::clone(&config.http_client),
            Arc::clone(&config.file_system),
        )?);
        cache.initialize().await?;

        let library: Arc<dyn OfflineLibraryRepository> =
            Arc::new(SqliteOfflineLibraryRepository::new(Arc::clone(&db)));
        let settings: Arc<dyn KeyValueRepository> = Arc::new(SqliteKeyValueRepository::new(db));

        let engine = Arc::new(OfflineSyncEngine::new(
            Arc::clone(&library),
            Arc::clone(&config.http_client),
            Arc::clone(&config.file_system),
            &config.offline_dir,
        ));
        engine.initialize().await?;

        info!(
            cache_dir = %config.cache_dir.display(),
            offline_dir = %config.offline_dir.display(),
            "Core service initialized"
        );

        Ok(Self {
            config,
            cache,
            engine,
            library,
            settings,
            disposed: AtomicBool::new(false),
        })
    }

    /// Cancels in-flight cache downloads and releases the registry.
    ///
    /// Subsequent calls fail with [`CoreError::Disposed`].
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cache.dispose().await;
        info!("Core service disposed");
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Cache entry for `locator` with one reference taken for the caller.
    ///
    /// `key` overrides the key derived from the locator, e.g. for signed
    /// URLs whose query string changes between requests.
    pub async fn get_cache(&self, locator: &str, key: Option<CacheKey>) -> Result<Arc<CacheEntry>> {
        self.ensure_live()?;
        Ok(self.cache.get_cache(locator, key).await?)
    }

    /// Existing cache entry for `key`, if any. Takes no reference.
    pub async fn peek_cache(&self, key: &CacheKey) -> Result<Option<Arc<CacheEntry>>> {
        self.ensure_live()?;
        Ok(self.cache.peek_cache(key).await)
    }

    /// [`peek_cache`](Self::peek_cache) with the key derived from `locator`.
    pub async fn peek_cache_for(&self, locator: &str) -> Result<Option<Arc<CacheEntry>>> {
        self.peek_cache(&CacheKey::derive(locator)).await
    }

    pub fn cache_registry(&self) -> &CacheRegistry {
        &self.cache
    }

    /// See [`OfflineSyncEngine::set_offline_videos`].
    pub async fn set_offline_videos(
        &self,
        desired: &[DesiredVideo],
        progress: &dyn ProgressSink,
    ) -> Result<Option<Vec<OfflineEntry>>> {
        self.ensure_live()?;
        Ok(self.engine.set_offline_videos(desired, progress).await?)
    }

    pub async fn get_offline_videos(&self) -> Result<Vec<OfflineEntry>> {
        self.ensure_live()?;
        Ok(self.engine.get_offline_videos().await?)
    }

    pub async fn update_filter(&self, updates: &[FilterUpdate]) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.engine.update_filter(updates).await?)
    }

    pub async fn cleanup(&self) -> Result<Option<CleanupReport>> {
        self.ensure_live()?;
        Ok(self.engine.cleanup().await?)
    }

    pub fn is_syncing(&self) -> bool {
        self.engine.is_running()
    }

    /// The offline entry for `key` as playable media, if it is persisted.
    pub async fn offline_item(&self, key: &VideoKey) -> Result<Option<Arc<dyn PlayableMedia>>> {
        self.ensure_live()?;
        let Some(entry) = self.library.get_by_key(key).await? else {
            return Ok(None);
        };
        let chapters = self.library.chapters_for(key).await?;
        Ok(Some(CachedVideoItem::new(entry, &chapters).into_shared()))
    }

    /// Generic key/value settings store.
    pub fn settings(&self) -> Arc<dyn KeyValueRepository> {
        Arc::clone(&self.settings)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(CoreError::Disposed)
        } else {
            Ok(())
        }
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses `ReqwestHttpClient` and `TokioFileSystem`; the offline directory
/// defaults to `offline/` next to the database.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// let core = core_service::bootstrap_desktop("/data/library.db", "/cache/video").await?;
/// let library = core.get_offline_videos().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    database_path: impl Into<std::path::PathBuf>,
    cache_dir: impl Into<std::path::PathBuf>,
) -> Result<CoreService> {
    let config = CoreConfig::builder()
        .database_path(database_path)
        .cache_dir(cache_dir)
        .build()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    CoreService::init(config).await
}
