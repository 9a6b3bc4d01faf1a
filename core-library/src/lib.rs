//! # Offline Library Module
//!
//! Owns the persistent store behind the offline video library:
//!
//! - [`models`]: `OfflineEntry`, `ChapterEntry`, `VideoKey`
//! - [`adapters`]: the sqlx-backed SQLite `DatabaseAdapter`
//! - [`repositories`]: offline entries with their chapter sidecar rows, and a
//!   generic key/value store
//!
//! Schema migrations live in `migrations/` and are embedded at compile time.

pub mod adapters;
pub mod error;
pub mod models;
pub mod repositories;

pub use adapters::SqliteAdapter;
pub use error::{LibraryError, Result};
pub use models::{ChapterEntry, OfflineEntry, VideoKey};
pub use repositories::{
    FilterUpdate, KeyValueRepository, OfflineLibraryRepository, SqliteKeyValueRepository,
    SqliteOfflineLibraryRepository,
};
