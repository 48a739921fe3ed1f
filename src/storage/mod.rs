mod feeds;
mod news_items;
mod schema;
mod search;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, FeedSource, NewNewsItem, StoredNewsItem};
