//! Cache statistics and sweep reports

use serde::{Deserialize, Serialize};

/// Snapshot of the cache registry and its directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently in the registry table
    pub entries: usize,

    /// Entries with `ref_count > 0`
    pub referenced_entries: usize,

    /// Entries with a download in flight
    pub downloading_entries: usize,

    /// Files found in the cache directory
    pub files_on_disk: usize,

    /// Total size of those files
    pub bytes_on_disk: u64,
}

impl CacheStats {
    /// Calculate cache usage as a percentage of `max_size`.
    pub fn usage_percentage(&self, max_size: u64) -> f64 {
        if max_size == 0 {
            return 0.0;
        }

        (self.bytes_on_disk as f64 / max_size as f64) * 100.0
    }

    /// Returns true if the cache holds at least `max_size` bytes.
    pub fn is_full(&self, max_size: u64) -> bool {
        self.bytes_on_disk >= max_size
    }
}

/// Outcome of one [`sweep`](super::CacheRegistry::sweep).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Another sweep was already running; nothing was examined.
    pub skipped: bool,

    /// Files present before eviction
    pub files_before: usize,

    /// Bytes present before eviction
    pub bytes_before: u64,

    /// Byte budget computed for this pass
    pub byte_budget: u64,

    /// Files deleted
    pub evicted_files: usize,

    /// Bytes released
    pub evicted_bytes: u64,

    /// Eviction candidates kept because they were referenced or downloading
    pub retained_in_use: usize,
}

impl SweepReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn files_after(&self) -> usize {
        self.files_before.saturating_sub(self.evicted_files)
    }

    pub fn bytes_after(&self) -> u64 {
        self.bytes_before.saturating_sub(self.evicted_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percentage() {
        let stats = CacheStats {
            bytes_on_disk: 250,
            ..Default::default()
        };
        assert_eq!(stats.usage_percentage(1_000), 25.0);
        assert_eq!(stats.usage_percentage(0), 0.0);
        assert!(!stats.is_full(1_000));
        assert!(stats.is_full(250));
    }

    #[test]
    fn test_sweep_report_totals() {
        let report = SweepReport {
            files_before: 10,
            bytes_before: 1_000,
            evicted_files: 3,
            evicted_bytes: 300,
            ..Default::default()
        };
        assert_eq!(report.files_after(), 7);
        assert_eq!(report.bytes_after(), 700);
        assert!(SweepReport::skipped().skipped);
    }
}
