//! Generic key/value settings persisted next to the offline library.

use super::get_string;
use crate::error::Result;
use bridge_traits::database::DatabaseAdapter;
use std::sync::Arc;
use tracing::instrument;

#[async_trait::async_trait]
pub trait KeyValueRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns whether a row was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

pub struct SqliteKeyValueRepository {
    db: Arc<dyn DatabaseAdapter>,
}

impl SqliteKeyValueRepository {
    pub fn new(db: Arc<dyn DatabaseAdapter>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl KeyValueRepository for SqliteKeyValueRepository {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = self
            .db
            .query_one_optional("SELECT value FROM key_values WHERE key = ?", &[key.into()])
            .await?;
        row.as_ref().map(|row| get_string(row, "value")).transpose()
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .execute(
                "INSERT INTO key_values (key, value) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                &[key.into(), value.into()],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self
            .db
            .execute("DELETE FROM key_values WHERE key = ?", &[key.into()])
            .await?;
        Ok(removed > 0)
    }
}
