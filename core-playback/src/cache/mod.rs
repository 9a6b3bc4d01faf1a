//! # Content Cache Module
//!
//! Mirrors remotely addressed video bytes on local disk under a bounded
//! size/count budget.
//!
//! ## Overview
//!
//! - Each locator maps to a fixed-length [`CacheKey`] which doubles as the
//!   file name inside the cache directory
//! - A [`CacheEntry`] downloads its content at most once at a time and lets
//!   any number of callers await the same download
//! - Entries are reference counted; the [`CacheRegistry`] sweep evicts the
//!   oldest unreferenced files once the directory exceeds its budget
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     CacheRegistry                      │
//! │  - get_cache() / peek_cache()          │
//! │  - sweep()                             │
//! └────────┬───────────────────────────────┘
//!          │ key -> Arc<CacheEntry>
//!          ├──> CacheEntry::get_file() ──> HttpClient (download task)
//!          └──> FileSystemAccess (cache directory)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, CacheRegistry};
//!
//! # async fn example(registry: &CacheRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let entry = registry.get_cache("https://cdn.example.com/v/42.mp4", None).await?;
//! match entry.get_file().await {
//!     Some(path) => println!("playing {}", path.display()),
//!     None => println!("download failed: {:?}", entry.error()),
//! }
//! entry.release();
//!
//! let stats = registry.stats().await?;
//! println!("Cache size: {} MB", stats.bytes_on_disk / 1_000_000);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod key;
pub mod registry;
pub mod stats;

pub use config::{CacheConfig, DEFAULT_MAX_CACHE_BYTES, DEFAULT_MAX_FILE_COUNT};
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use registry::CacheRegistry;
pub use stats::{CacheStats, SweepReport};
