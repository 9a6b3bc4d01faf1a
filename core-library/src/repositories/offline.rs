//! Offline video repository
//!
//! Persists [`OfflineEntry`] rows and their [`ChapterEntry`] sidecar rows.
//! Schema lives in `migrations/001_offline_library.sql`.

use super::{get_i64, get_optional_string, get_string};
use crate::error::{LibraryError, Result};
use crate::models::{ChapterEntry, OfflineEntry, VideoKey};
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue, Statement};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, instrument};

const SELECT_COLUMNS: &str = "video_key, file_path, display_name, trim_start, trim_end, \
     media_type, sort_order, filter_flag, size_bytes, duration_ms";

/// New values for the ordering/filter columns of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterUpdate {
    pub video_key: VideoKey,
    pub filter_flag: i64,
    pub sort_order: i64,
}

#[async_trait::async_trait]
pub trait OfflineLibraryRepository: Send + Sync {
    /// All entries ordered by `sort_order`.
    async fn get_all_ordered(&self) -> Result<Vec<OfflineEntry>>;

    async fn get_by_key(&self, key: &VideoKey) -> Result<Option<OfflineEntry>>;

    /// Chapter rows of one entry ordered by position.
    async fn chapters_for(&self, key: &VideoKey) -> Result<Vec<ChapterEntry>>;

    /// Insert an entry and its chapters in one transaction.
    async fn insert_with_chapters(
        &self,
        entry: &OfflineEntry,
        chapters: &[ChapterEntry],
    ) -> Result<()>;

    /// Delete entries and their chapters in one transaction. Returns the
    /// number of entry rows removed.
    async fn delete_with_chapters(&self, keys: &[VideoKey]) -> Result<u64>;

    /// Rewrite `sort_order` for the given keys in one transaction.
    async fn update_sort_orders(&self, orders: &[(VideoKey, i64)]) -> Result<u64>;

    /// Rewrite `filter_flag` and `sort_order` together, one statement per
    /// update, in one transaction. Returns the number of statements issued.
    async fn update_filter_and_sort(&self, updates: &[FilterUpdate]) -> Result<usize>;
}

/// `DatabaseAdapter`-backed implementation of [`OfflineLibraryRepository`].
pub struct SqliteOfflineLibraryRepository {
    db: Arc<dyn DatabaseAdapter>,
}

impl SqliteOfflineLibraryRepository {
    pub fn new(db: Arc<dyn DatabaseAdapter>) -> Self {
        Self { db }
    }

    fn row_to_entry(row: &QueryRow) -> Result<OfflineEntry> {
        Ok(OfflineEntry {
            video_key: VideoKey::new(get_string(row, "video_key")?),
            file_path: PathBuf::from(get_string(row, "file_path")?),
            display_name: get_string(row, "display_name")?,
            trim_start: get_i64(row, "trim_start")?,
            trim_end: get_i64(row, "trim_end")?,
            media_type: get_string(row, "media_type")?,
            sort_order: get_i64(row, "sort_order")?,
            filter_flag: get_i64(row, "filter_flag")?,
            size_bytes: get_i64(row, "size_bytes")?.max(0) as u64,
            duration_ms: get_i64(row, "duration_ms")?,
        })
    }

    fn row_to_chapter(row: &QueryRow) -> Result<ChapterEntry> {
        Ok(ChapterEntry {
            video_key: VideoKey::new(get_string(row, "video_key")?),
            position: get_i64(row, "position")?,
            label: get_optional_string(row, "label")?,
            skip: get_i64(row, "skip")? != 0,
        })
    }

    fn invalid(field: &str, message: String) -> LibraryError {
        LibraryError::InvalidInput {
            field: field.to_string(),
            message,
        }
    }

    async fn run_batch(&self, statements: Vec<Statement>, what: &str) -> Result<Vec<u64>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        self.db.execute_batch(&statements).await.map_err(|e| {
            error!("Failed to {}: {}", what, e);
            LibraryError::Bridge(e)
        })
    }
}

#[async_trait::async_trait]
impl OfflineLibraryRepository for SqliteOfflineLibraryRepository {
    #[instrument(skip(self))]
    async fn get_all_ordered(&self) -> Result<Vec<OfflineEntry>> {
        let sql = format!(
            "SELECT {} FROM offline_videos ORDER BY sort_order ASC, video_key ASC",
            SELECT_COLUMNS
        );
        let rows = self.db.query(&sql, &[]).await?;
        rows.iter().map(Self::row_to_entry).collect()
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn get_by_key(&self, key: &VideoKey) -> Result<Option<OfflineEntry>> {
        let sql = format!(
            "SELECT {} FROM offline_videos WHERE video_key = ?",
            SELECT_COLUMNS
        );
        let row = self
            .db
            .query_one_optional(&sql, &[key.as_str().into()])
            .await?;
        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn chapters_for(&self, key: &VideoKey) -> Result<Vec<ChapterEntry>> {
        let rows = self
            .db
            .query(
                "SELECT video_key, position, label, skip FROM offline_chapters \
                 WHERE video_key = ? ORDER BY position ASC",
                &[key.as_str().into()],
            )
            .await?;
        rows.iter().map(Self::row_to_chapter).collect()
    }

    #[instrument(skip(self, entry, chapters), fields(key = %entry.video_key, chapters = chapters.len()))]
    async fn insert_with_chapters(
        &self,
        entry: &OfflineEntry,
        chapters: &[ChapterEntry],
    ) -> Result<()> {
        entry
            .validate()
            .map_err(|message| Self::invalid("entry", message))?;

        let mut statements = Vec::with_capacity(chapters.len() + 1);
        statements.push(Statement::new(
            "INSERT INTO offline_videos (video_key, file_path, display_name, trim_start, \
             trim_end, media_type, sort_order, filter_flag, size_bytes, duration_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                entry.video_key.as_str().into(),
                entry.file_path.to_string_lossy().into_owned().into(),
                entry.display_name.as_str().into(),
                QueryValue::Integer(entry.trim_start),
                QueryValue::Integer(entry.trim_end),
                entry.media_type.as_str().into(),
                QueryValue::Integer(entry.sort_order),
                QueryValue::Integer(entry.filter_flag),
                QueryValue::Integer(entry.size_bytes as i64),
                QueryValue::Integer(entry.duration_ms),
            ],
        ));

        for chapter in chapters {
            if chapter.video_key != entry.video_key {
                return Err(Self::invalid(
                    "chapters",
                    format!("chapter belongs to {}", chapter.video_key),
                ));
            }
            chapter
                .validate()
                .map_err(|message| Self::invalid("chapters", message))?;
            statements.push(Statement::new(
                "INSERT INTO offline_chapters (video_key, position, label, skip) VALUES (?, ?, ?, ?)",
                vec![
                    chapter.video_key.as_str().into(),
                    QueryValue::Integer(chapter.position),
                    chapter.label.clone().into(),
                    chapter.skip.into(),
                ],
            ));
        }

        self.run_batch(statements, "insert offline entry").await?;
        debug!("Inserted offline entry");
        Ok(())
    }

    #[instrument(skip(self, keys), fields(count = keys.len()))]
    async fn delete_with_chapters(&self, keys: &[VideoKey]) -> Result<u64> {
        let statements = keys
            .iter()
            .flat_map(|key| {
                [
                    Statement::new(
                        "DELETE FROM offline_chapters WHERE video_key = ?",
                        vec![key.as_str().into()],
                    ),
                    Statement::new(
                        "DELETE FROM offline_videos WHERE video_key = ?",
                        vec![key.as_str().into()],
                    ),
                ]
            })
            .collect();

        let counts = self.run_batch(statements, "delete offline entries").await?;
        // Odd positions hold the offline_videos deletes.
        Ok(counts.iter().skip(1).step_by(2).sum())
    }

    #[instrument(skip(self, orders), fields(count = orders.len()))]
    async fn update_sort_orders(&self, orders: &[(VideoKey, i64)]) -> Result<u64> {
        let statements = orders
            .iter()
            .map(|(key, order)| {
                Statement::new(
                    "UPDATE offline_videos SET sort_order = ? WHERE video_key = ?",
                    vec![QueryValue::Integer(*order), key.as_str().into()],
                )
            })
            .collect();

        let counts = self.run_batch(statements, "reorder offline entries").await?;
        Ok(counts.iter().sum())
    }

    #[instrument(skip(self, updates), fields(count = updates.len()))]
    async fn update_filter_and_sort(&self, updates: &[FilterUpdate]) -> Result<usize> {
        let statements: Vec<Statement> = updates
            .iter()
            .map(|update| {
                Statement::new(
                    "UPDATE offline_videos SET filter_flag = ?, sort_order = ? WHERE video_key = ?",
                    vec![
                        QueryValue::Integer(update.filter_flag),
                        QueryValue::Integer(update.sort_order),
                        update.video_key.as_str().into(),
                    ],
                )
            })
            .collect();

        let issued = statements.len();
        self.run_batch(statements, "update offline filters").await?;
        Ok(issued)
    }
}
