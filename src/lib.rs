//! Syndication feed ingestion: fetch RSS 2.0 and Atom feeds, extract and
//! validate their entries, and store new items without duplicates.
//!
//! The entry point is [`crawl::Importer`]; [`storage::Database`] provides
//! the SQLite-backed store and search index it writes to.

pub mod config;
pub mod crawl;
pub mod feed;
pub mod storage;
pub mod util;
