//! Feed import pipeline.
//!
//! [`Importer::import`] runs one crawl of a feed source: fetch, redirect
//! policy, format detection, extraction, then per entry validation,
//! deduplication and persistence. The outcome is only visible through the
//! source's crawl status and the items created.
//!
//! Storage and search are reached through [`NewsStore`] and [`SearchIndex`],
//! both implemented by [`crate::storage::Database`].

mod dedup;
mod importer;
mod outcome;
mod validate;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::{Database, DatabaseError, NewNewsItem, StoredNewsItem};

pub use dedup::DedupKey;
pub use importer::{ImportSettings, Importer};
pub use outcome::{
    CrawlOutcome, CrawlTermination, EntryResult, STATUS_EMPTY_FEED, STATUS_OK,
    STATUS_UNKNOWN_FORMAT,
};
pub use validate::{check_fields, check_probe, EntryFailure};

/// Persistence used by a crawl. Only the crawl fields of a feed source are
/// ever written.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// `None` when an item with the same dedup key already exists.
    async fn create_item(
        &self,
        feed_source_id: i64,
        item: &NewNewsItem,
    ) -> Result<Option<StoredNewsItem>, DatabaseError>;

    async fn find_existing(
        &self,
        feed_source_id: i64,
        key: &DedupKey,
    ) -> Result<Option<StoredNewsItem>, DatabaseError>;

    async fn touch_last_crawled_at(&self, feed_source_id: i64) -> Result<(), DatabaseError>;

    async fn set_last_crawl_status(&self, feed_source_id: i64, status: &str) -> Result<(), DatabaseError>;

    async fn update_url(&self, feed_source_id: i64, url: &str) -> Result<(), DatabaseError>;

    async fn latest_published_at(
        &self,
        feed_source_id: i64,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError>;
}

/// Makes newly created items searchable.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(&self, items: &[StoredNewsItem]) -> Result<(), DatabaseError>;
}

#[async_trait]
impl NewsStore for Database {
    async fn create_item(
        &self,
        feed_source_id: i64,
        item: &NewNewsItem,
    ) -> Result<Option<StoredNewsItem>, DatabaseError> {
        Database::create_item(self, feed_source_id, item).await
    }

    async fn find_existing(
        &self,
        feed_source_id: i64,
        key: &DedupKey,
    ) -> Result<Option<StoredNewsItem>, DatabaseError> {
        match key {
            DedupKey::Guid(guid) => self.find_by_guid(feed_source_id, guid).await,
            DedupKey::Link(link) => self.find_by_link(feed_source_id, link).await,
        }
    }

    async fn touch_last_crawled_at(&self, feed_source_id: i64) -> Result<(), DatabaseError> {
        Database::touch_last_crawled_at(self, feed_source_id).await
    }

    async fn set_last_crawl_status(&self, feed_source_id: i64, status: &str) -> Result<(), DatabaseError> {
        Database::set_last_crawl_status(self, feed_source_id, status).await
    }

    async fn update_url(&self, feed_source_id: i64, url: &str) -> Result<(), DatabaseError> {
        Database::update_url(self, feed_source_id, url).await
    }

    async fn latest_published_at(
        &self,
        feed_source_id: i64,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        Database::latest_published_at(self, feed_source_id).await
    }
}

#[async_trait]
impl SearchIndex for Database {
    async fn index(&self, items: &[StoredNewsItem]) -> Result<(), DatabaseError> {
        self.index_items(items).await
    }
}
