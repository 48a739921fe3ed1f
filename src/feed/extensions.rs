//! Field resolution shared by the RSS and Atom extractors.
//!
//! Each field that can come from several namespaces has exactly one ordered
//! list of attempts here. Attempts are evaluated in order and the first
//! non-empty value wins.

use super::date::parse_feed_date;
use super::entry::{MediaObject, RawFeedEntry, IMAGE_TAG};
use super::xml::{Element, Ns};
use crate::util::{non_blank, strip_markup};

pub(crate) type Attempt = fn(&Element) -> Option<String>;

/// Full-content sources, highest priority first.
const BODY_SOURCES: &[Attempt] = &[
    |item| item.child_text(Ns::Content, "encoded"),
    media_text,
    |item| item.child(Ns::Atom, "content").and_then(atom_text_construct),
    |item| item.child(Ns::Atom, "summary").and_then(atom_text_construct),
];

/// Dublin Core contributor sources, highest priority first. Format-native
/// author fields are appended by each extractor.
const CONTRIBUTOR_SOURCES: &[Attempt] = &[
    |item| item.child_text(Ns::DublinCore, "contributor"),
    |item| item.child_text(Ns::DublinCore, "creator"),
];

pub(crate) fn first_of(item: &Element, attempts: &[Attempt]) -> Option<String> {
    attempts.iter().find_map(|attempt| attempt(item))
}

pub(crate) fn resolve_body(item: &Element) -> Option<String> {
    first_of(item, BODY_SOURCES)
}

pub(crate) fn resolve_contributor(item: &Element, native: &[Attempt]) -> Option<String> {
    first_of(item, CONTRIBUTOR_SOURCES).or_else(|| first_of(item, native))
}

/// Text of an Atom text construct (`content`, `summary`, `title`).
///
/// `type="xhtml"` keeps the markup inside the wrapping `<div>`; `text` and
/// `html` carry their payload as character data. Out-of-line content
/// (`src=`) has no text.
pub(crate) fn atom_text_construct(element: &Element) -> Option<String> {
    if element.attr("src").is_some() {
        return None;
    }
    let raw = match element.attr("type") {
        Some(t) if t.eq_ignore_ascii_case("xhtml") => match element.elements().next() {
            Some(div) => div.inner_markup(),
            None => element.inner_markup(),
        },
        _ => element.text(),
    };
    non_blank(&raw).map(str::to_string)
}

/// `media:text`, directly on the item or inside a `media:group`.
fn media_text(item: &Element) -> Option<String> {
    media_scopes(item).find_map(|scope| scope.child_text(Ns::Media, "text"))
}

/// The item itself followed by each of its `media:group` children.
fn media_scopes(item: &Element) -> impl Iterator<Item = &Element> {
    std::iter::once(item).chain(item.children_named(Ns::Media, "group"))
}

/// Collects every Dublin Core subject in document order, dropping exact
/// duplicates, joined with `", "`.
pub(crate) fn merge_subjects(item: &Element) -> Option<String> {
    let mut subjects: Vec<String> = Vec::new();
    for element in item.children_named(Ns::DublinCore, "subject") {
        let text = element.text();
        let Some(subject) = non_blank(&text) else {
            continue;
        };
        if !subjects.iter().any(|s| s == subject) {
            subjects.push(subject.to_string());
        }
    }
    if subjects.is_empty() {
        None
    } else {
        Some(subjects.join(", "))
    }
}

fn media_object(element: &Element) -> Option<MediaObject> {
    let url = non_blank(element.attr("url")?)?.to_string();
    let mime_type = element
        .attr("type")
        .and_then(non_blank)
        .map(str::to_string);
    Some(MediaObject { url, mime_type })
}

fn is_image(element: &Element) -> bool {
    let typed_image = element
        .attr("type")
        .is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("image/"));
    let medium_image = element
        .attr("medium")
        .is_some_and(|m| m.trim().eq_ignore_ascii_case("image"));
    typed_image || medium_image
}

/// First `media:content` with a URL, and whether it is an image.
fn resolve_media_content(item: &Element) -> Option<(MediaObject, bool)> {
    media_scopes(item)
        .flat_map(|scope| scope.children_named(Ns::Media, "content"))
        .find_map(|content| media_object(content).map(|obj| (obj, is_image(content))))
}

fn resolve_media_thumbnail(item: &Element) -> Option<MediaObject> {
    let direct = media_scopes(item)
        .flat_map(|scope| scope.children_named(Ns::Media, "thumbnail"))
        .find_map(media_object);
    direct.or_else(|| {
        media_scopes(item)
            .flat_map(|scope| scope.children_named(Ns::Media, "content"))
            .flat_map(|content| content.children_named(Ns::Media, "thumbnail"))
            .find_map(media_object)
    })
}

/// Reads a date field from the first candidate that parses. When none
/// does, the first unparseable text is kept for diagnostics.
pub(crate) fn resolve_published(entry: &mut RawFeedEntry, candidates: &[Option<String>]) {
    for raw in candidates.iter().flatten() {
        match parse_feed_date(raw) {
            Some(dt) => {
                entry.published_at = Some(dt);
                entry.unparsed_published = None;
                return;
            }
            None => {
                tracing::debug!(date = %raw, "Unparseable entry date");
                if entry.unparsed_published.is_none() {
                    entry.unparsed_published = Some(raw.clone());
                }
            }
        }
    }
}

/// Applies the namespace-extension fields every format shares: body,
/// Dublin Core subject/publisher, Media RSS attachments and the derived
/// image tag. `description` falls back to the stripped body.
pub(crate) fn apply_shared_fields(item: &Element, entry: &mut RawFeedEntry) {
    entry.body = resolve_body(item);
    entry.subject = merge_subjects(item);
    entry.publisher = item.child_text(Ns::DublinCore, "publisher");

    if let Some((content, image)) = resolve_media_content(item) {
        entry.media_content = Some(content);
        if image {
            entry.tags.push(IMAGE_TAG.to_string());
        }
    }
    entry.media_thumbnail = resolve_media_thumbnail(item);

    if entry.description.is_none() {
        entry.description = entry
            .body
            .as_deref()
            .map(strip_markup)
            .and_then(|s| non_blank(&s).map(str::to_string));
    }
}

/// Strips markup from a synopsis candidate; blank results become `None`.
pub(crate) fn plain_text(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let stripped = strip_markup(&raw);
    non_blank(&stripped).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml::parse_document;

    const NS: &str = r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:media="http://search.yahoo.com/mrss/""#;

    fn item(inner: &str) -> Element {
        let xml = format!("<item {NS}>{inner}</item>");
        parse_document(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_body_priority_content_encoded_first() {
        let el = item(
            "<media:text>media</media:text><content:encoded><![CDATA[<p>full</p>]]></content:encoded>",
        );
        assert_eq!(resolve_body(&el).as_deref(), Some("<p>full</p>"));
    }

    #[test]
    fn test_body_skips_blank_candidates() {
        let el = item("<content:encoded>   </content:encoded><media:text>  from media  </media:text>");
        assert_eq!(resolve_body(&el).as_deref(), Some("from media"));
    }

    #[test]
    fn test_body_from_media_group() {
        let el = item("<media:group><media:text>grouped</media:text></media:group>");
        assert_eq!(resolve_body(&el).as_deref(), Some("grouped"));
    }

    #[test]
    fn test_body_missing_is_none() {
        let el = item("<title>no body</title>");
        assert_eq!(resolve_body(&el), None);
    }

    #[test]
    fn test_subjects_merged_in_order_without_duplicates() {
        let el = item("<dc:subject>A</dc:subject><dc:subject>B</dc:subject><dc:subject> A </dc:subject>");
        assert_eq!(merge_subjects(&el).as_deref(), Some("A, B"));
    }

    #[test]
    fn test_subjects_absent() {
        assert_eq!(merge_subjects(&item("<title>x</title>")), None);
        assert_eq!(merge_subjects(&item("<dc:subject> </dc:subject>")), None);
    }

    #[test]
    fn test_media_content_with_type_tags_image() {
        let el = item(
            r#"<media:content url="http://x/b.jpg" type="image/jpeg"/><media:thumbnail url="http://x/s.jpg"/>"#,
        );
        let mut entry = RawFeedEntry::default();
        apply_shared_fields(&el, &mut entry);
        assert_eq!(
            entry.media_content,
            Some(MediaObject {
                url: "http://x/b.jpg".into(),
                mime_type: Some("image/jpeg".into())
            })
        );
        assert_eq!(
            entry.media_thumbnail,
            Some(MediaObject {
                url: "http://x/s.jpg".into(),
                mime_type: None
            })
        );
        assert_eq!(entry.tags, vec!["image".to_string()]);
    }

    #[test]
    fn test_media_content_without_type_left_unset() {
        let el = item(r#"<media:content url="http://x/b.jpg"/>"#);
        let mut entry = RawFeedEntry::default();
        apply_shared_fields(&el, &mut entry);
        assert_eq!(entry.media_content.unwrap().mime_type, None);
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_medium_image_tags_image() {
        let el = item(r#"<media:content url="http://x/b.jpg" medium="image"/>"#);
        let mut entry = RawFeedEntry::default();
        apply_shared_fields(&el, &mut entry);
        assert!(entry.has_image());
    }

    #[test]
    fn test_media_content_without_url_ignored() {
        let el = item(r#"<media:content type="image/jpeg"/>"#);
        let mut entry = RawFeedEntry::default();
        apply_shared_fields(&el, &mut entry);
        assert_eq!(entry.media_content, None);
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_thumbnail_nested_in_content() {
        let el = item(
            r#"<media:group><media:content url="http://x/v.mp4" type="video/mp4"><media:thumbnail url="http://x/t.jpg"/></media:content></media:group>"#,
        );
        let mut entry = RawFeedEntry::default();
        apply_shared_fields(&el, &mut entry);
        assert_eq!(entry.media_thumbnail.unwrap().url, "http://x/t.jpg");
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_description_falls_back_to_stripped_body() {
        let el = item("<content:encoded><![CDATA[<p>Hello <b>there</b></p>]]></content:encoded>");
        let mut entry = RawFeedEntry::default();
        apply_shared_fields(&el, &mut entry);
        assert_eq!(entry.description.as_deref(), Some("Hello there"));
        assert_eq!(entry.body.as_deref(), Some("<p>Hello <b>there</b></p>"));
    }

    #[test]
    fn test_contributor_prefers_dublin_core() {
        let el = item("<author>a@b (Author)</author><dc:creator>Creator</dc:creator>");
        let native: &[Attempt] = &[|i| i.child_text(Ns::Rss, "author")];
        assert_eq!(resolve_contributor(&el, native).as_deref(), Some("Creator"));

        let el = item("<author>a@b (Author)</author>");
        assert_eq!(resolve_contributor(&el, native).as_deref(), Some("a@b (Author)"));
    }

    #[test]
    fn test_published_unparseable_is_flagged() {
        let mut entry = RawFeedEntry::default();
        resolve_published(&mut entry, &[None, Some("not a date".into())]);
        assert_eq!(entry.published_at, None);
        assert_eq!(entry.unparsed_published.as_deref(), Some("not a date"));
    }

    #[test]
    fn test_published_falls_through_to_parseable_candidate() {
        let mut entry = RawFeedEntry::default();
        resolve_published(
            &mut entry,
            &[Some("someday".into()), Some("2020-05-04T10:00:00Z".into())],
        );
        assert_eq!(entry.published_at.map(|d| d.to_rfc3339()).as_deref(), Some("2020-05-04T10:00:00+00:00"));
        assert_eq!(entry.unparsed_published, None);

        let mut entry = RawFeedEntry::default();
        resolve_published(&mut entry, &[Some("first".into()), Some("second".into())]);
        assert_eq!(entry.published_at, None);
        assert_eq!(entry.unparsed_published.as_deref(), Some("first"));
    }
}
