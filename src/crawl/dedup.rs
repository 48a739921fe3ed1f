use std::fmt;

use super::NewsStore;
use crate::storage::DatabaseError;
use crate::util::link_key;

/// Identity of an entry within one feed source.
///
/// A guid, when the feed supplies one, is authoritative; otherwise the link
/// identifies the entry, compared without its http/https scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupKey {
    Guid(String),
    Link(String),
}

impl DedupKey {
    pub fn new(guid: Option<&str>, link: &str) -> Self {
        match guid.map(str::trim).filter(|g| !g.is_empty()) {
            Some(guid) => DedupKey::Guid(guid.to_string()),
            None => DedupKey::Link(link.trim().to_string()),
        }
    }

    /// Value of the `news_items.dedup_key` column.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupKey::Guid(guid) => write!(f, "guid:{guid}"),
            DedupKey::Link(link) => write!(f, "link:{}", link_key(link)),
        }
    }
}

/// Whether the source already holds an item with this identity.
pub async fn is_duplicate(
    store: &dyn NewsStore,
    feed_source_id: i64,
    key: &DedupKey,
) -> Result<bool, DatabaseError> {
    Ok(store.find_existing(feed_source_id, key).await?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_wins_over_link() {
        assert_eq!(
            DedupKey::new(Some(" abc "), "http://x/a"),
            DedupKey::Guid("abc".into())
        );
        assert_eq!(
            DedupKey::new(Some("  "), "http://x/a"),
            DedupKey::Link("http://x/a".into())
        );
        assert_eq!(DedupKey::new(None, "http://x/a"), DedupKey::Link("http://x/a".into()));
    }

    #[test]
    fn test_storage_key_is_scheme_insensitive_for_links() {
        let http = DedupKey::new(None, "http://x/a").storage_key();
        let https = DedupKey::new(None, "https://x/a").storage_key();
        assert_eq!(http, "link:x/a");
        assert_eq!(http, https);
        assert_eq!(DedupKey::new(Some("g-1"), "http://x/a").storage_key(), "guid:g-1");
    }

    #[test]
    fn test_guid_is_exact() {
        assert_ne!(
            DedupKey::new(Some("http://x/a"), "l").storage_key(),
            DedupKey::new(Some("https://x/a"), "l").storage_key()
        );
    }
}
