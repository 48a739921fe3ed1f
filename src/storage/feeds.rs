use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, FeedSource};

impl Database {
    // ========================================================================
    // Feed Source Operations
    // ========================================================================

    /// Register a feed source, or return the existing one for the same URL.
    pub async fn insert_feed_source(&self, name: &str, url: &str) -> Result<FeedSource, DatabaseError> {
        let now = Utc::now().timestamp();
        // DO UPDATE (not DO NOTHING) so RETURNING yields the existing row
        let source = sqlx::query_as::<_, FeedSource>(
            r#"
            INSERT INTO feed_sources (name, url, created_at) VALUES (?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET url = excluded.url
            RETURNING id, name, url, last_crawl_status, last_crawled_at, created_at
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(source)
    }

    pub async fn get_feed_source(&self, id: i64) -> Result<Option<FeedSource>, DatabaseError> {
        let source = sqlx::query_as::<_, FeedSource>(
            "SELECT id, name, url, last_crawl_status, last_crawled_at, created_at FROM feed_sources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(source)
    }

    pub async fn list_feed_sources(&self) -> Result<Vec<FeedSource>, DatabaseError> {
        let sources = sqlx::query_as::<_, FeedSource>(
            "SELECT id, name, url, last_crawl_status, last_crawled_at, created_at FROM feed_sources ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    /// Stamp the start of a crawl attempt.
    pub async fn touch_last_crawled_at(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE feed_sources SET last_crawled_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::Other(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    pub async fn set_last_crawl_status(&self, id: i64, status: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feed_sources SET last_crawl_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rewrite the canonical URL after an http/https-only redirect.
    ///
    /// Fails with `DatabaseError::UrlTaken` when another source already has
    /// that URL.
    pub async fn update_url(&self, id: i64, url: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feed_sources SET url = ? WHERE id = ?")
            .bind(url)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    DatabaseError::UrlTaken(url.to_string())
                }
                other => DatabaseError::from(other),
            })?;
        Ok(())
    }

    /// Remove a feed source and, through the foreign key, all of its items.
    pub async fn delete_feed_source(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let source = db
            .insert_feed_source("Blog", "https://blog.example.com/rss")
            .await
            .unwrap();

        assert_eq!(source.name, "Blog");
        assert_eq!(source.url, "https://blog.example.com/rss");
        assert_eq!(source.last_crawl_status, None);
        assert_eq!(source.last_crawled_at, None);

        let fetched = db.get_feed_source(source.id).await.unwrap();
        assert_eq!(fetched, Some(source));
        assert_eq!(db.get_feed_source(9999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_same_url_returns_existing() {
        let db = test_db().await;
        let first = db.insert_feed_source("One", "https://x.example.com/feed").await.unwrap();
        let second = db.insert_feed_source("Two", "https://x.example.com/feed").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "One");
        assert_eq!(db.list_feed_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_crawl_fields_updates() {
        let db = test_db().await;
        let source = db.insert_feed_source("Blog", "http://blog.example.com/rss").await.unwrap();

        db.touch_last_crawled_at(source.id).await.unwrap();
        db.set_last_crawl_status(source.id, "OK").await.unwrap();
        db.update_url(source.id, "https://blog.example.com/rss").await.unwrap();

        let updated = db.get_feed_source(source.id).await.unwrap().unwrap();
        assert!(updated.last_crawled_at.is_some());
        assert_eq!(updated.last_crawl_status.as_deref(), Some("OK"));
        assert_eq!(updated.url, "https://blog.example.com/rss");
    }

    #[tokio::test]
    async fn test_update_url_to_taken_url() {
        let db = test_db().await;
        let plain = db.insert_feed_source("Plain", "http://blog.example.com/rss").await.unwrap();
        db.insert_feed_source("Secure", "https://blog.example.com/rss").await.unwrap();

        let err = db
            .update_url(plain.id, "https://blog.example.com/rss")
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UrlTaken(_)), "got {err:?}");
        assert_eq!(
            err.to_string(),
            "Another feed source already uses https://blog.example.com/rss"
        );

        let unchanged = db.get_feed_source(plain.id).await.unwrap().unwrap();
        assert_eq!(unchanged.url, "http://blog.example.com/rss");
    }

    #[tokio::test]
    async fn test_touch_unknown_source_fails() {
        let db = test_db().await;
        assert!(db.touch_last_crawled_at(42).await.is_err());
    }

    #[tokio::test]
    async fn test_list_ordered_by_name() {
        let db = test_db().await;
        db.insert_feed_source("Zeta", "https://z.example.com/feed").await.unwrap();
        db.insert_feed_source("Alpha", "https://a.example.com/feed").await.unwrap();

        let names: Vec<_> = db
            .list_feed_sources()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn test_delete_feed_source() {
        let db = test_db().await;
        let source = db.insert_feed_source("Gone", "https://g.example.com/feed").await.unwrap();
        assert!(db.delete_feed_source(source.id).await.unwrap());
        assert!(!db.delete_feed_source(source.id).await.unwrap());
        assert_eq!(db.get_feed_source(source.id).await.unwrap(), None);
    }
}
