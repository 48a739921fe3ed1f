use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("Database is locked by another process. Please try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be mapped back into a domain value
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// Another feed source is already registered under this URL
    #[error("Another feed source already uses {0}")]
    UrlTaken(String),

    /// Search query rejected before reaching FTS5
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Feed Sources
// ============================================================================

/// A subscribed feed endpoint.
///
/// Only `url`, `last_crawl_status` and `last_crawled_at` are ever changed by
/// a crawl.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedSource {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub last_crawl_status: Option<String>,
    /// Unix seconds.
    pub last_crawled_at: Option<i64>,
    pub created_at: i64,
}

// ============================================================================
// News Items
// ============================================================================

/// A validated entry ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNewsItem {
    /// `guid:<guid>` or `link:<link without scheme>`, unique per source.
    pub dedup_key: String,
    pub guid: Option<String>,
    pub link: String,
    pub title: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub published_at: DateTime<Utc>,
    pub contributor: Option<String>,
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub media_content_url: Option<String>,
    pub media_content_type: Option<String>,
    pub media_thumbnail_url: Option<String>,
    pub tags: Vec<String>,
}

/// A persisted news item. Never updated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNewsItem {
    pub id: i64,
    pub feed_source_id: i64,
    pub dedup_key: String,
    pub guid: Option<String>,
    pub link: String,
    pub title: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub published_at: DateTime<Utc>,
    pub contributor: Option<String>,
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub media_content_url: Option<String>,
    pub media_content_type: Option<String>,
    pub media_thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: i64,
}

/// Internal row type for news item queries (used by sqlx FromRow).
/// Converts to [`StoredNewsItem`] via `into_item()`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NewsItemRow {
    pub id: i64,
    pub feed_source_id: i64,
    pub dedup_key: String,
    pub guid: Option<String>,
    pub link: String,
    pub title: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub published_at: i64,
    pub contributor: Option<String>,
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub media_content_url: Option<String>,
    pub media_content_type: Option<String>,
    pub media_thumbnail_url: Option<String>,
    /// JSON array of strings.
    pub tags: String,
    pub created_at: i64,
}

/// Column list matching [`NewsItemRow`], for SELECT and RETURNING clauses.
pub(crate) const NEWS_ITEM_COLUMNS: &str = "id, feed_source_id, dedup_key, guid, link, title, \
     description, body, published_at, contributor, subject, publisher, media_content_url, \
     media_content_type, media_thumbnail_url, tags, created_at";

impl NewsItemRow {
    pub(crate) fn into_item(self) -> Result<StoredNewsItem, DatabaseError> {
        let published_at =
            DateTime::from_timestamp(self.published_at, 0).ok_or_else(|| DatabaseError::CorruptRow {
                table: "news_items",
                reason: format!("published_at {} out of range", self.published_at),
            })?;
        let tags: Vec<String> =
            serde_json::from_str(&self.tags).map_err(|e| DatabaseError::CorruptRow {
                table: "news_items",
                reason: format!("tags: {e}"),
            })?;

        Ok(StoredNewsItem {
            id: self.id,
            feed_source_id: self.feed_source_id,
            dedup_key: self.dedup_key,
            guid: self.guid,
            link: self.link,
            title: self.title,
            description: self.description,
            body: self.body,
            published_at,
            contributor: self.contributor,
            subject: self.subject,
            publisher: self.publisher,
            media_content_url: self.media_content_url,
            media_content_type: self.media_content_type,
            media_thumbnail_url: self.media_thumbnail_url,
            tags,
            created_at: self.created_at,
        })
    }
}
