//! Database Abstraction Layer
//!
//! The relational store behind the offline library is reached only through
//! [`DatabaseAdapter`]. Desktop hosts and tests use the sqlx-backed SQLite
//! adapter from `core-library`; mobile hosts may inject their own.
//!
//! ```ignore
//! use bridge_traits::database::{DatabaseAdapter, QueryValue};
//!
//! let rows = db
//!     .query("SELECT video_key FROM offline_videos WHERE filter_flag = ?", &[QueryValue::Integer(1)])
//!     .await?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path or connection string
    pub database_url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }

    /// In-memory database. Every pooled connection would see its own empty
    /// database, so the pool is pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout_secs: 30,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// A single row as a map of column names to values
pub type QueryRow = std::collections::HashMap<String, QueryValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl QueryValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Real(r) => Some(*r),
            QueryValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        self.as_str().map(str::to_owned)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Integer(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Integer(value as i64)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Null, Into::into)
    }
}

/// One statement of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<QueryValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Database adapter trait
///
/// Implementations must be `Send + Sync`; every method takes `&self` apart
/// from lifecycle calls. All queries are parameterised with positional `?`
/// placeholders.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Connect, configure pragmas and run pending migrations.
    async fn initialize(&mut self) -> Result<()>;

    async fn health_check(&self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// Execute a query and return all rows.
    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>>;

    /// Execute a statement and return the number of affected rows.
    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64>;

    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>>;

    /// Run every statement inside one transaction.
    ///
    /// Either all statements commit or none do. Returns the affected row count
    /// per statement.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<u64>>;

    async fn get_statistics(&self) -> Result<DatabaseStatistics>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStatistics {
    pub total_connections: u32,
    pub idle_connections: u32,
    /// Database file size in bytes (if applicable)
    pub database_size_bytes: Option<u64>,
}

/// Helper macro to extract values from a [`QueryRow`]
#[macro_export]
macro_rules! get_column {
    ($row:expr, $col:expr, i64) => {
        $row.get($col).and_then(|v| v.as_i64()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!("Missing or invalid i64 column: {}", $col))
        })?
    };
    ($row:expr, $col:expr, String) => {
        $row.get($col).and_then(|v| v.as_string()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!(
                "Missing or invalid String column: {}",
                $col
            ))
        })?
    };
    ($row:expr, $col:expr, Option<String>) => {
        $row.get($col)
            .and_then(|v| if v.is_null() { None } else { v.as_string() })
    };
    ($row:expr, $col:expr, Option<i64>) => {
        $row.get($col)
            .and_then(|v| if v.is_null() { None } else { v.as_i64() })
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_value_conversions() {
        let int_val = QueryValue::Integer(42);
        assert_eq!(int_val.as_i64(), Some(42));
        assert_eq!(int_val.as_f64(), Some(42.0));
        assert!(int_val.as_str().is_none());

        let text_val = QueryValue::from("hello");
        assert_eq!(text_val.as_string(), Some("hello".to_string()));

        assert!(QueryValue::from(None::<String>).is_null());
        assert_eq!(QueryValue::from(true), QueryValue::Integer(1));
    }

    #[test]
    fn in_memory_config_uses_single_connection() {
        let config = DatabaseConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn test_database_config_from_path() {
        let config = DatabaseConfig::new("library.db");
        assert!(config.database_url.ends_with("library.db"));
        assert!(!config.is_in_memory());
    }

    #[test]
    fn get_column_reads_optional_text() -> crate::error::Result<()> {
        let mut row = QueryRow::new();
        row.insert("label".into(), QueryValue::Null);
        row.insert("position".into(), QueryValue::Integer(3));

        let label: Option<String> = get_column!(row, "label", Option<String>);
        let position: i64 = get_column!(row, "position", i64);
        assert!(label.is_none());
        assert_eq!(position, 3);
        Ok(())
    }
}
