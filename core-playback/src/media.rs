//! Playable media abstraction.
//!
//! The player consumes `Arc<dyn PlayableMedia>` and does not care whether the
//! bytes come from the network or from the offline library.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use core_library::{ChapterEntry, OfflineEntry, OfflineLibraryRepository, VideoKey};

use crate::error::{PlaybackError, Result};

/// Where the player should read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Stream or cache through the content cache.
    Remote { locator: String },
    /// A file in the offline library.
    LocalFile { path: PathBuf, media_type: String },
}

/// Playback window inside the media, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrimRange {
    pub start_ms: i64,
    /// `None` plays to the end.
    pub end_ms: Option<i64>,
}

/// A chapter marker as seen by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub position_ms: i64,
    pub label: Option<String>,
    pub skip: bool,
}

impl From<&ChapterEntry> for Chapter {
    fn from(entry: &ChapterEntry) -> Self {
        Self {
            position_ms: entry.position,
            label: entry.label.clone(),
            skip: entry.skip,
        }
    }
}

pub trait PlayableMedia: Send + Sync {
    fn key(&self) -> &VideoKey;
    fn display_name(&self) -> &str;
    fn source(&self) -> MediaSource;
    fn duration(&self) -> Option<Duration>;
    fn trim_range(&self) -> TrimRange;
    fn chapters(&self) -> &[Chapter];
    fn is_offline(&self) -> bool;
}

/// A video addressed by its network locator.
#[derive(Debug, Clone)]
pub struct RemoteVideoItem {
    key: VideoKey,
    display_name: String,
    duration: Option<Duration>,
    trim: TrimRange,
    chapters: Vec<Chapter>,
}

impl RemoteVideoItem {
    pub fn new(locator: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: VideoKey::new(locator),
            display_name: display_name.into(),
            duration: None,
            trim: TrimRange::default(),
            chapters: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_trim(mut self, trim: TrimRange) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }
}

impl PlayableMedia for RemoteVideoItem {
    fn key(&self) -> &VideoKey {
        &self.key
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn source(&self) -> MediaSource {
        MediaSource::Remote {
            locator: self.key.as_str().to_string(),
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn trim_range(&self) -> TrimRange {
        self.trim
    }

    fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    fn is_offline(&self) -> bool {
        false
    }
}

/// An offline library entry together with its chapter rows.
#[derive(Debug, Clone)]
pub struct CachedVideoItem {
    entry: OfflineEntry,
    chapters: Vec<Chapter>,
}

impl CachedVideoItem {
    pub fn new(entry: OfflineEntry, chapters: &[ChapterEntry]) -> Self {
        let mut chapters: Vec<Chapter> = chapters.iter().map(Chapter::from).collect();
        chapters.sort_by_key(|c| c.position_ms);
        Self { entry, chapters }
    }

    /// Loads the entry and its chapters from the offline library.
    pub async fn load(repo: &dyn OfflineLibraryRepository, key: &VideoKey) -> Result<Self> {
        let entry = repo
            .get_by_key(key)
            .await?
            .ok_or_else(|| PlaybackError::MediaUnavailable(key.to_string()))?;
        let chapters = repo.chapters_for(key).await?;
        Ok(Self::new(entry, &chapters))
    }

    pub fn entry(&self) -> &OfflineEntry {
        &self.entry
    }

    pub fn into_shared(self) -> Arc<dyn PlayableMedia> {
        Arc::new(self)
    }
}

impl PlayableMedia for CachedVideoItem {
    fn key(&self) -> &VideoKey {
        &self.entry.video_key
    }

    fn display_name(&self) -> &str {
        &self.entry.display_name
    }

    fn source(&self) -> MediaSource {
        MediaSource::LocalFile {
            path: self.entry.file_path.clone(),
            media_type: self.entry.media_type.clone(),
        }
    }

    fn duration(&self) -> Option<Duration> {
        u64::try_from(self.entry.duration_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    fn trim_range(&self) -> TrimRange {
        TrimRange {
            start_ms: self.entry.trim_start,
            end_ms: (self.entry.trim_end > 0).then_some(self.entry.trim_end),
        }
    }

    fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    fn is_offline(&self) -> bool {
        true
    }
}
