//! Cache key derivation.
//!
//! A [`CacheKey`] is the file name of a cached video. It is derived from the
//! source locator in two passes: BLAKE3 over the locator bytes, then SHA-256
//! over the BLAKE3 digest followed by the same bytes. The result is 64
//! lowercase hex characters, safe on every filesystem the core runs on.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded key.
pub const KEY_LEN: usize = 64;

/// Fixed-length identifier of a cache entry and its backing file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `locator`. Deterministic across calls and processes.
    pub fn derive(locator: &str) -> Self {
        let bytes = locator.as_bytes();
        let first = blake3::hash(bytes);

        let mut hasher = Sha256::new();
        hasher.update(first.as_bytes());
        hasher.update(bytes);

        Self(hex::encode(hasher.finalize()))
    }

    /// Recovers a key from a cache file name.
    ///
    /// Accepts `<key>` and `<key>.<suffix>` (in-progress `.part` files), and
    /// rejects anything whose stem is not 64 lowercase hex characters.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.split('.').next().unwrap_or(name);
        if stem.len() != KEY_LEN {
            return None;
        }
        if !stem
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }
        Some(Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
