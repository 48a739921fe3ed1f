use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag added to entries whose Media RSS content is an image.
pub const IMAGE_TAG: &str = "image";

/// A Media RSS attachment (`media:content` / `media:thumbnail`).
///
/// `mime_type` is only ever what the feed declared; it is never guessed from
/// the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaObject {
    pub url: String,
    pub mime_type: Option<String>,
}

/// Format-agnostic entry extracted from one `<item>` or `<entry>`.
///
/// Produced by the RSS and Atom extractors in document order, consumed by
/// the validator and deduplicator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedEntry {
    pub guid: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    /// Plain-text synopsis; markup already stripped.
    pub description: Option<String>,
    /// Full content with markup as authored, trimmed at the edges.
    pub body: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Date text that was present but could not be parsed.
    pub unparsed_published: Option<String>,
    pub contributor: Option<String>,
    /// Dublin Core subjects, deduplicated and joined with `", "`.
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub media_content: Option<MediaObject>,
    pub media_thumbnail: Option<MediaObject>,
    pub tags: Vec<String>,
}

impl RawFeedEntry {
    pub fn has_image(&self) -> bool {
        self.tags.iter().any(|t| t == IMAGE_TAG)
    }
}
