use thiserror::Error;

use super::dedup::DedupKey;
use crate::feed::{status_code, RawFeedEntry};
use crate::storage::NewNewsItem;
use crate::util::non_blank;

/// Why an entry was skipped. The `Display` text is the crawl-status reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum EntryFailure {
    #[error("Title can't be blank")]
    BlankTitle,

    #[error("Missing link field")]
    MissingLink,

    /// Absent, or present but unparseable.
    #[error("Missing pubDate field")]
    MissingPubDate,

    /// Holds the numeric status, or the whole probe description when it
    /// carries no status code.
    #[error("Linked URL does not exist (HTTP {0})")]
    LinkUnreachable(String),
}

impl EntryFailure {
    pub fn from_probe(description: &str) -> Self {
        let detail = match status_code(description) {
            Some(code) => code.to_string(),
            None => description.trim().to_string(),
        };
        EntryFailure::LinkUnreachable(detail)
    }
}

/// Field checks, in order: title, link, publication date.
///
/// On success the entry is converted into the record that will be stored.
pub fn check_fields(entry: &RawFeedEntry) -> Result<NewNewsItem, EntryFailure> {
    let title = entry
        .title
        .as_deref()
        .and_then(non_blank)
        .ok_or(EntryFailure::BlankTitle)?;
    let link = entry
        .link
        .as_deref()
        .and_then(non_blank)
        .ok_or(EntryFailure::MissingLink)?;
    let published_at = entry.published_at.ok_or(EntryFailure::MissingPubDate)?;

    let guid = entry.guid.as_deref().and_then(non_blank);
    let dedup_key = DedupKey::new(guid, link).storage_key();

    Ok(NewNewsItem {
        dedup_key,
        guid: guid.map(str::to_string),
        link: link.to_string(),
        title: title.to_string(),
        description: entry.description.clone(),
        body: entry.body.clone(),
        published_at,
        contributor: entry.contributor.clone(),
        subject: entry.subject.clone(),
        publisher: entry.publisher.clone(),
        media_content_url: entry.media_content.as_ref().map(|m| m.url.clone()),
        media_content_type: entry.media_content.as_ref().and_then(|m| m.mime_type.clone()),
        media_thumbnail_url: entry.media_thumbnail.as_ref().map(|m| m.url.clone()),
        tags: entry.tags.clone(),
    })
}

/// Final check: the link prober must have answered with a 2xx status.
pub fn check_probe(description: &str) -> Result<(), EntryFailure> {
    if crate::feed::is_success_description(description) {
        Ok(())
    } else {
        Err(EntryFailure::from_probe(description))
    }
}
