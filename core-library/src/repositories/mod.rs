//! # Repository Pattern Implementation
//!
//! Repository traits and their `DatabaseAdapter`-backed implementations.
//!
//! - [`OfflineLibraryRepository`]: offline videos and their chapter sidecar rows
//! - [`KeyValueRepository`]: opaque string settings
//!
//! Every multi-row mutation goes through `DatabaseAdapter::execute_batch` and is
//! therefore a single transaction.

pub mod offline;
pub mod settings;

pub use offline::{FilterUpdate, OfflineLibraryRepository, SqliteOfflineLibraryRepository};
pub use settings::{KeyValueRepository, SqliteKeyValueRepository};

use crate::error::{LibraryError, Result};
use bridge_traits::database::{QueryRow, QueryValue};

pub(crate) fn get_string(row: &QueryRow, key: &str) -> Result<String> {
    row.get(key)
        .and_then(QueryValue::as_string)
        .ok_or_else(|| LibraryError::InvalidRow(format!("Missing column: {}", key)))
}

pub(crate) fn get_optional_string(row: &QueryRow, key: &str) -> Result<Option<String>> {
    Ok(match row.get(key) {
        Some(QueryValue::Null) | None => None,
        Some(value) => Some(value.as_string().ok_or_else(|| {
            LibraryError::InvalidRow(format!("Invalid type for column: {}", key))
        })?),
    })
}

pub(crate) fn get_i64(row: &QueryRow, key: &str) -> Result<i64> {
    row.get(key)
        .and_then(QueryValue::as_i64)
        .ok_or_else(|| LibraryError::InvalidRow(format!("Missing column: {}", key)))
}
