//! # Offline Sync Module
//!
//! Keeps the offline video library in line with the user's "keep offline" list.
//!
//! ## Overview
//!
//! This module manages:
//! - Diffing the desired list against persisted rows
//! - Downloading new items sequentially with per-item progress
//! - Unregistering, reordering and filtering persisted rows transactionally
//! - Pruning rows whose file vanished and deleting orphaned files
//!
//! ## Components
//!
//! - **Sync Engine** (`engine`): single-flight guarded reconciliation and the
//!   library maintenance operations
//! - **Progress** (`progress`): `DownloadProgress` snapshots and the sinks that receive them

pub mod engine;
pub mod error;
pub mod progress;

pub use engine::{CleanupReport, DesiredVideo, OfflineSyncEngine, RemoteChapter, RemoteVideo};
pub use error::{Result, SyncError};
pub use progress::{DownloadProgress, NoopProgressSink, ProgressSink, ProgressTracker};
