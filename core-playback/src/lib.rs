//! # Playback Content Module
//!
//! Provides the content cache and the playable media abstraction.
//!
//! ## Overview
//!
//! This module handles:
//! - Locator to cache key derivation
//! - Reference-counted cache entries with single in-flight downloads
//! - Budgeted eviction sweeps over the cache directory
//! - Remote and offline media behind one `PlayableMedia` trait

pub mod cache;
pub mod error;
pub mod media;

pub use cache::{CacheConfig, CacheEntry, CacheKey, CacheRegistry, CacheStats, SweepReport};
pub use error::{PlaybackError, Result};
pub use media::{CachedVideoItem, Chapter, MediaSource, PlayableMedia, RemoteVideoItem, TrimRange};
