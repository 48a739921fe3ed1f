use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database shared by the pool,
    /// which is what the tests use.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Migration` when the schema cannot be created.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // SEC-010: Create the file owner-only before SQLite does
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() && db_path.parent().is_some_and(|p| p.as_os_str().is_empty() || p.exists()) {
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok(); // If creation fails, SQLite will report the error at connect_with.
            }
        }

        // busy_timeout=5000: overlapping crawls wait on the write lock instead
        // of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(|e| match DatabaseError::from_sqlx(e) {
            DatabaseError::Other(e) => DatabaseError::Migration(e.to_string()),
            locked => locked,
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// Every statement is `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_sources (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                last_crawl_status TEXT,
                last_crawled_at INTEGER,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // UNIQUE(feed_source_id, dedup_key) is the backstop for overlapping
        // crawls of one source racing on the same entry.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_items (
                id INTEGER PRIMARY KEY,
                feed_source_id INTEGER NOT NULL REFERENCES feed_sources(id) ON DELETE CASCADE,
                dedup_key TEXT NOT NULL,
                guid TEXT,
                link TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                body TEXT,
                published_at INTEGER NOT NULL,
                contributor TEXT,
                subject TEXT,
                publisher TEXT,
                media_content_url TEXT,
                media_content_type TEXT,
                media_thumbnail_url TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                UNIQUE(feed_source_id, dedup_key)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Recency filter and listing: newest first per source
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_items_source_published ON news_items(feed_source_id, published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Link lookups for entries without a guid
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_news_items_source_link ON news_items(feed_source_id, link)")
            .execute(&mut *tx)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_news_items_source_guid ON news_items(feed_source_id, guid)")
            .execute(&mut *tx)
            .await?;

        // Written explicitly by the search indexer, rowid = news_items.id
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS news_items_fts
            USING fts5(title, description, body)
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Keep the index free of orphans when a source is removed
        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS news_items_fts_delete AFTER DELETE ON news_items BEGIN
                DELETE FROM news_items_fts WHERE rowid = old.id;
            END
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_creates_schema() {
        let db = Database::open(":memory:").await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('feed_sources', 'news_items', 'news_items_fts') ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();
        let names: Vec<_> = tables.into_iter().map(|(n,)| n).collect();
        assert_eq!(names, vec!["feed_sources", "news_items", "news_items_fts"]);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = std::env::temp_dir().join(format!("feedcrawl-schema-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("crawl.db");
        let path_str = path.to_str().unwrap();

        let db = Database::open(path_str).await.unwrap();
        drop(db);
        // Reopen runs migrations against existing tables
        Database::open(path_str).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
