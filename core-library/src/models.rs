//! Domain models for the offline video library
//!
//! Plain data types mirroring the persisted tables. Validation lives on the
//! types so repositories can reject bad input before touching the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of an offline video: its source locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoKey(String);

impl VideoKey {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VideoKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A video stored on the device for offline playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineEntry {
    pub video_key: VideoKey,
    /// Absolute path of the downloaded file
    pub file_path: PathBuf,
    pub display_name: String,
    /// Trim window in milliseconds; `trim_end == 0` means "play to the end"
    pub trim_start: i64,
    pub trim_end: i64,
    pub media_type: String,
    pub sort_order: i64,
    pub filter_flag: i64,
    pub size_bytes: u64,
    pub duration_ms: i64,
}

impl OfflineEntry {
    pub fn validate(&self) -> Result<(), String> {
        if self.video_key.as_str().trim().is_empty() {
            return Err("Video key cannot be empty".to_string());
        }

        if self.file_path.as_os_str().is_empty() {
            return Err("File path cannot be empty".to_string());
        }

        if self.trim_start < 0 || self.trim_end < 0 {
            return Err("Trim bounds cannot be negative".to_string());
        }

        if self.trim_end != 0 && self.trim_end < self.trim_start {
            return Err(format!(
                "Trim end {} precedes trim start {}",
                self.trim_end, self.trim_start
            ));
        }

        if self.duration_ms < 0 {
            return Err("Duration cannot be negative".to_string());
        }

        Ok(())
    }
}

/// One chapter marker of an offline video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub video_key: VideoKey,
    /// Chapter start in milliseconds
    pub position: i64,
    pub label: Option<String>,
    /// Playback skips this chapter
    pub skip: bool,
}

impl ChapterEntry {
    pub fn validate(&self) -> Result<(), String> {
        if self.position < 0 {
            return Err("Chapter position cannot be negative".to_string());
        }
        Ok(())
    }
}
