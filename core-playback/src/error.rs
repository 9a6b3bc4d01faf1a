//! # Playback Error Types
//!
//! Errors raised by the content cache and the playable media abstraction.

use thiserror::Error;

/// Errors that can occur in the cache and media layer.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// The registry was used before `initialize()` or after `dispose()`.
    #[error("Cache registry not initialized")]
    NotInitialized,

    /// Cache configuration rejected by `CacheConfig::validate`.
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// A download for a cache entry failed.
    #[error("Download failed for {key}: {message}")]
    DownloadFailed { key: String, message: String },

    // ========================================================================
    // Media Errors
    // ========================================================================
    /// The offline entry backing a media item is gone.
    #[error("Media not available: {0}")]
    MediaUnavailable(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Platform bridge failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Library error from core-library.
    #[error("Library error: {0}")]
    LibraryError(#[from] core_library::error::LibraryError),
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
