//! Cache configuration and sweep budget

use std::path::PathBuf;

/// Default hard cap on cached bytes (512 MiB).
pub const DEFAULT_MAX_CACHE_BYTES: u64 = 512 * 1024 * 1024;

/// Default cap on the number of cached files.
pub const DEFAULT_MAX_FILE_COUNT: usize = 100;

/// Configuration for the [`CacheRegistry`](super::CacheRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding one file per cache key.
    pub cache_directory: PathBuf,

    /// Hard byte cap, applied regardless of disk size.
    pub max_cache_bytes: u64,

    /// Maximum number of files kept in `cache_directory`.
    pub max_file_count: usize,

    /// Share of the volume's total capacity the cache may use (default: 5).
    pub disk_capacity_percent: u8,

    /// Share of `free space + current cache size` the cache may use (default: 10).
    pub free_space_percent: u8,
}

impl CacheConfig {
    pub fn new(cache_directory: impl Into<PathBuf>) -> Self {
        Self {
            cache_directory: cache_directory.into(),
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            disk_capacity_percent: 5,
            free_space_percent: 10,
        }
    }

    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_cache_bytes = bytes;
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_file_count = count;
        self
    }

    pub fn with_percentages(mut self, disk_capacity: u8, free_space: u8) -> Self {
        self.disk_capacity_percent = disk_capacity;
        self.free_space_percent = free_space;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_directory.as_os_str().is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        if self.max_cache_bytes == 0 {
            return Err("max_cache_bytes must be greater than 0".to_string());
        }

        if self.max_file_count == 0 {
            return Err("max_file_count must be at least 1".to_string());
        }

        for (name, value) in [
            ("disk_capacity_percent", self.disk_capacity_percent),
            ("free_space_percent", self.free_space_percent),
        ] {
            if !(1..=100).contains(&value) {
                return Err(format!("{name} must be within 1..=100, got {value}"));
            }
        }

        Ok(())
    }

    /// Byte budget for one sweep.
    ///
    /// The smallest of the hard cap, `disk_capacity_percent` of the volume and
    /// `free_space_percent` of the space the cache could grow into.
    pub fn byte_budget(&self, disk_total: u64, disk_available: u64, cache_size: u64) -> u64 {
        let of_capacity = percent_of(disk_total, self.disk_capacity_percent);
        let of_free = percent_of(disk_available.saturating_add(cache_size), self.free_space_percent);
        self.max_cache_bytes.min(of_capacity).min(of_free)
    }
}

fn percent_of(value: u64, percent: u8) -> u64 {
    ((value as u128 * percent as u128) / 100) as u64
}
