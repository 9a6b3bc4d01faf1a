//! # Download Progress
//!
//! Counters published while the offline library downloads new items.

use serde::{Deserialize, Serialize};

/// Message reported when an item was registered.
pub const ITEM_OK: &str = "OK";

/// Message reported when an item failed and was skipped.
pub const ITEM_FAILED: &str = "NG";

/// Snapshot of a running registration phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Current phase or per-item result
    pub message: String,
    /// Items to download in this sync
    pub item_count: usize,
    /// Zero-based index of the item in flight; equals `item_count` when done
    pub item_index: usize,
    /// Expected size of the current item, 0 when unknown
    pub total_bytes: u64,
    /// Bytes of the current item written so far
    pub received_bytes: u64,
}

impl DownloadProgress {
    /// Progress within the current item (0-100).
    pub fn byte_percent(&self) -> u8 {
        percent(self.received_bytes, self.total_bytes)
    }

    /// Progress across items (0-100).
    pub fn item_percent(&self) -> u8 {
        percent(self.item_index as u64, self.item_count as u64)
    }
}

fn percent(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part as u128 * 100) / whole as u128).min(100) as u8
}

/// Receives progress snapshots.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &DownloadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&DownloadProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &DownloadProgress) {
        self(progress)
    }
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_progress(&self, _progress: &DownloadProgress) {}
}

/// Mutates a [`DownloadProgress`] and publishes each change.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    current: DownloadProgress,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink, item_count: usize) -> Self {
        Self {
            sink,
            current: DownloadProgress {
                item_count,
                ..DownloadProgress::default()
            },
        }
    }

    pub fn snapshot(&self) -> &DownloadProgress {
        &self.current
    }

    pub fn begin_item(&mut self, index: usize, message: impl Into<String>, total_bytes: Option<u64>) {
        self.current.item_index = index;
        self.current.message = message.into();
        self.current.total_bytes = total_bytes.unwrap_or(0);
        self.current.received_bytes = 0;
        self.publish();
    }

    pub fn set_total_bytes(&mut self, total_bytes: Option<u64>) {
        self.current.total_bytes = total_bytes.unwrap_or(0);
        self.publish();
    }

    pub fn add_bytes(&mut self, bytes: u64) {
        self.current.received_bytes = self.current.received_bytes.saturating_add(bytes);
        self.publish();
    }

    /// Reports the item's outcome and advances the item counter.
    pub fn finish_item(&mut self, ok: bool) {
        self.current.message = if ok { ITEM_OK } else { ITEM_FAILED }.to_string();
        self.current.item_index = (self.current.item_index + 1).min(self.current.item_count);
        self.publish();
    }

    fn publish(&self) {
        self.sink.on_progress(&self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn percentages_are_clamped() {
        let mut progress = DownloadProgress {
            item_count: 4,
            item_index: 1,
            total_bytes: 200,
            received_bytes: 50,
            ..Default::default()
        };
        assert_eq!(progress.byte_percent(), 25);
        assert_eq!(progress.item_percent(), 25);

        progress.received_bytes = 500;
        progress.item_index = 9;
        assert_eq!(progress.byte_percent(), 100);
        assert_eq!(progress.item_percent(), 100);
    }

    #[test]
    fn zero_denominators_give_zero() {
        let progress = DownloadProgress {
            received_bytes: 10,
            item_index: 3,
            ..Default::default()
        };
        assert_eq!(progress.byte_percent(), 0);
        assert_eq!(progress.item_percent(), 0);
    }

    #[test]
    fn tracker_publishes_each_step() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: &DownloadProgress| seen.lock().unwrap().push(p.clone());

        let mut tracker = ProgressTracker::new(&sink, 2);
        tracker.begin_item(0, "clip one", Some(10));
        tracker.add_bytes(4);
        tracker.add_bytes(6);
        tracker.finish_item(true);
        tracker.begin_item(1, "clip two", None);
        tracker.finish_item(false);
        assert_eq!(tracker.snapshot().item_index, 2);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[2].byte_percent(), 100);
        assert_eq!(seen[3].message, ITEM_OK);
        assert_eq!(seen[3].item_percent(), 50);
        assert_eq!(seen[5].message, ITEM_FAILED);
        assert_eq!(seen[5].item_percent(), 100);
    }
}
