use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, NewNewsItem, NewsItemRow, StoredNewsItem, NEWS_ITEM_COLUMNS};
use crate::util::scheme_variants;

/// Maximum number of items returned by a listing query (OOM protection)
pub(crate) const MAX_ITEMS: i64 = 2000;

impl Database {
    // ========================================================================
    // News Item Operations
    // ========================================================================

    /// Insert a news item.
    ///
    /// Returns `None` when an item with the same dedup key already exists
    /// for the source; the existing row is left untouched.
    pub async fn create_item(
        &self,
        feed_source_id: i64,
        item: &NewNewsItem,
    ) -> Result<Option<StoredNewsItem>, DatabaseError> {
        let tags = serde_json::to_string(&item.tags).map_err(|e| DatabaseError::CorruptRow {
            table: "news_items",
            reason: format!("tags: {e}"),
        })?;

        let sql = format!(
            r#"
            INSERT INTO news_items (
                feed_source_id, dedup_key, guid, link, title, description, body,
                published_at, contributor, subject, publisher, media_content_url,
                media_content_type, media_thumbnail_url, tags, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_source_id, dedup_key) DO NOTHING
            RETURNING {NEWS_ITEM_COLUMNS}
        "#
        );

        let row = sqlx::query_as::<_, NewsItemRow>(&sql)
            .bind(feed_source_id)
            .bind(&item.dedup_key)
            .bind(&item.guid)
            .bind(&item.link)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.body)
            .bind(item.published_at.timestamp())
            .bind(&item.contributor)
            .bind(&item.subject)
            .bind(&item.publisher)
            .bind(&item.media_content_url)
            .bind(&item.media_content_type)
            .bind(&item.media_thumbnail_url)
            .bind(tags)
            .bind(Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await?;

        row.map(NewsItemRow::into_item).transpose()
    }

    /// Stored item with this exact guid for the source.
    pub async fn find_by_guid(
        &self,
        feed_source_id: i64,
        guid: &str,
    ) -> Result<Option<StoredNewsItem>, DatabaseError> {
        let sql = format!(
            "SELECT {NEWS_ITEM_COLUMNS} FROM news_items WHERE feed_source_id = ? AND guid = ? LIMIT 1"
        );
        let row = sqlx::query_as::<_, NewsItemRow>(&sql)
            .bind(feed_source_id)
            .bind(guid)
            .fetch_optional(&self.pool)
            .await?;
        row.map(NewsItemRow::into_item).transpose()
    }

    /// Stored item whose link equals `link` up to an http/https swap.
    pub async fn find_by_link(
        &self,
        feed_source_id: i64,
        link: &str,
    ) -> Result<Option<StoredNewsItem>, DatabaseError> {
        let variants = scheme_variants(link);
        let placeholders = vec!["?"; variants.len()].join(", ");
        let sql = format!(
            "SELECT {NEWS_ITEM_COLUMNS} FROM news_items WHERE feed_source_id = ? AND link IN ({placeholders}) LIMIT 1"
        );

        let mut query = sqlx::query_as::<_, NewsItemRow>(&sql).bind(feed_source_id);
        for variant in &variants {
            query = query.bind(variant);
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(NewsItemRow::into_item).transpose()
    }

    /// Newest `published_at` among the source's stored items.
    pub async fn latest_published_at(
        &self,
        feed_source_id: i64,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let latest: (Option<i64>,) =
            sqlx::query_as("SELECT MAX(published_at) FROM news_items WHERE feed_source_id = ?")
                .bind(feed_source_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(latest.0.and_then(|secs| DateTime::from_timestamp(secs, 0)))
    }

    /// Items of one source, newest first.
    /// PERF-003: Hard cap at MAX_ITEMS to prevent OOM
    pub async fn items_for_source(
        &self,
        feed_source_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<StoredNewsItem>, DatabaseError> {
        let limit = limit.unwrap_or(MAX_ITEMS).clamp(0, MAX_ITEMS);
        let sql = format!(
            "SELECT {NEWS_ITEM_COLUMNS} FROM news_items WHERE feed_source_id = ? ORDER BY published_at DESC, id DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, NewsItemRow>(&sql)
            .bind(feed_source_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(NewsItemRow::into_item).collect()
    }

    pub async fn count_items(&self, feed_source_id: i64) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news_items WHERE feed_source_id = ?")
            .bind(feed_source_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewNewsItem};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn test_db() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let source = db
            .insert_feed_source("Test", "https://feed.example.com/rss")
            .await
            .unwrap();
        (db, source.id)
    }

    fn test_item(key: &str, link: &str, hour: u32) -> NewNewsItem {
        NewNewsItem {
            dedup_key: key.to_string(),
            guid: key.strip_prefix("guid:").map(str::to_string),
            link: link.to_string(),
            title: format!("Title {key}"),
            description: Some("Synopsis".into()),
            body: Some("<p>Body</p>".into()),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            contributor: None,
            subject: Some("A, B".into()),
            publisher: None,
            media_content_url: Some("http://x/a.jpg".into()),
            media_content_type: Some("image/jpeg".into()),
            media_thumbnail_url: None,
            tags: vec!["image".into()],
        }
    }

    #[tokio::test]
    async fn test_create_item_round_trips_fields() {
        let (db, source_id) = test_db().await;
        let new = test_item("guid:1", "https://example.com/1", 10);

        let stored = db.create_item(source_id, &new).await.unwrap().unwrap();

        assert_eq!(stored.feed_source_id, source_id);
        assert_eq!(stored.dedup_key, "guid:1");
        assert_eq!(stored.guid.as_deref(), Some("1"));
        assert_eq!(stored.title, new.title);
        assert_eq!(stored.published_at, new.published_at);
        assert_eq!(stored.subject.as_deref(), Some("A, B"));
        assert_eq!(stored.media_content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(stored.tags, vec!["image".to_string()]);
        assert!(stored.created_at > 0);
    }

    #[tokio::test]
    async fn test_create_item_conflict_is_none() {
        let (db, source_id) = test_db().await;
        let new = test_item("guid:1", "https://example.com/1", 10);

        assert!(db.create_item(source_id, &new).await.unwrap().is_some());
        assert!(db.create_item(source_id, &new).await.unwrap().is_none());
        assert_eq!(db.count_items(source_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_key_allowed_across_sources() {
        let (db, source_id) = test_db().await;
        let other = db
            .insert_feed_source("Other", "https://other.example.com/rss")
            .await
            .unwrap();
        let new = test_item("guid:1", "https://example.com/1", 10);

        assert!(db.create_item(source_id, &new).await.unwrap().is_some());
        assert!(db.create_item(other.id, &new).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_by_guid_and_link() {
        let (db, source_id) = test_db().await;
        db.create_item(source_id, &test_item("link:x/a", "http://x/a", 10))
            .await
            .unwrap();
        db.create_item(source_id, &test_item("guid:g", "http://x/b", 11))
            .await
            .unwrap();

        assert!(db.find_by_guid(source_id, "g").await.unwrap().is_some());
        assert!(db.find_by_guid(source_id, "missing").await.unwrap().is_none());

        let by_https = db.find_by_link(source_id, "https://x/a").await.unwrap();
        assert_eq!(by_https.unwrap().link, "http://x/a");
        assert!(db.find_by_link(source_id, "https://x/b").await.unwrap().is_some());
        assert!(db.find_by_link(source_id, "http://x/A").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_published_at_and_listing_order() {
        let (db, source_id) = test_db().await;
        assert_eq!(db.latest_published_at(source_id).await.unwrap(), None);

        db.create_item(source_id, &test_item("guid:early", "http://x/1", 8))
            .await
            .unwrap();
        db.create_item(source_id, &test_item("guid:late", "http://x/2", 12))
            .await
            .unwrap();

        assert_eq!(
            db.latest_published_at(source_id).await.unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
        );

        let keys: Vec<_> = db
            .items_for_source(source_id, None)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.dedup_key)
            .collect();
        assert_eq!(keys, vec!["guid:late", "guid:early"]);

        assert_eq!(db.items_for_source(source_id, Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_items_removed_with_source() {
        let (db, source_id) = test_db().await;
        db.create_item(source_id, &test_item("guid:1", "http://x/1", 8))
            .await
            .unwrap();
        db.delete_feed_source(source_id).await.unwrap();
        assert_eq!(db.count_items(source_id).await.unwrap(), 0);
    }
}
