//! Atom 1.0 entry extraction.

use super::entry::RawFeedEntry;
use super::extensions::{
    apply_shared_fields, atom_text_construct, plain_text, resolve_contributor, resolve_published,
    Attempt,
};
use super::xml::{Element, Ns};

/// Person constructs consulted after Dublin Core, in order.
const PERSON_SOURCES: &[Attempt] = &[
    |entry| person_name(entry, "author"),
    |entry| person_name(entry, "contributor"),
];

/// Extracts every `<entry>` in document order.
pub fn extract(root: &Element) -> Vec<RawFeedEntry> {
    root.children_named(Ns::Atom, "entry")
        .map(extract_entry)
        .collect()
}

fn extract_entry(element: &Element) -> RawFeedEntry {
    let mut entry = RawFeedEntry {
        guid: element.child_text(Ns::Atom, "id"),
        link: alternate_link(element),
        title: plain_text(element.child(Ns::Atom, "title").and_then(atom_text_construct)),
        description: plain_text(element.child(Ns::Atom, "summary").and_then(atom_text_construct)),
        contributor: resolve_contributor(element, PERSON_SOURCES),
        ..RawFeedEntry::default()
    };

    resolve_published(
        &mut entry,
        &[
            element.child_text(Ns::Atom, "published"),
            element.child_text(Ns::Atom, "updated"),
            element.child_text(Ns::DublinCore, "date"),
        ],
    );
    apply_shared_fields(element, &mut entry);
    entry
}

/// `<link rel="alternate">`, or a link with no `rel` (which means the same),
/// else the first link carrying an `href`.
fn alternate_link(element: &Element) -> Option<String> {
    let hrefs = || {
        element.children_named(Ns::Atom, "link").filter_map(|link| {
            let href = link.attr("href")?.trim();
            (!href.is_empty()).then(|| (link.attr("rel").map(str::trim), href.to_string()))
        })
    };

    hrefs()
        .find(|(rel, _)| rel.map_or(true, |r| r.eq_ignore_ascii_case("alternate")))
        .or_else(|| hrefs().next())
        .map(|(_, href)| href)
}

fn person_name(element: &Element, role: &str) -> Option<String> {
    element
        .children_named(Ns::Atom, role)
        .find_map(|person| person.child_text(Ns::Atom, "name"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml::parse_document;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn entries(xml: &str) -> Vec<RawFeedEntry> {
        extract(&parse_document(xml.as_bytes()).unwrap())
    }

    fn feed(body: &str) -> String {
        format!(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Site</title>{body}</feed>"#)
    }

    #[test]
    fn test_extracts_core_fields() {
        let items = entries(&feed(
            r#"<entry>
                 <id>urn:uuid:1225c695</id>
                 <title type="html">Atom &lt;b&gt;Powered&lt;/b&gt;</title>
                 <link rel="self" href="http://example.org/self"/>
                 <link rel="alternate" href="http://example.org/2003/12/13/atom03"/>
                 <updated>2003-12-13T18:30:02Z</updated>
                 <summary>Some text.</summary>
                 <author><name>John Doe</name></author>
               </entry>"#,
        ));

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.guid.as_deref(), Some("urn:uuid:1225c695"));
        assert_eq!(item.title.as_deref(), Some("Atom Powered"));
        assert_eq!(item.link.as_deref(), Some("http://example.org/2003/12/13/atom03"));
        assert_eq!(
            item.published_at,
            Some(Utc.with_ymd_and_hms(2003, 12, 13, 18, 30, 2).unwrap())
        );
        assert_eq!(item.description.as_deref(), Some("Some text."));
        assert_eq!(item.body.as_deref(), Some("Some text."));
        assert_eq!(item.contributor.as_deref(), Some("John Doe"));
    }

    #[test]
    fn test_published_preferred_over_updated() {
        let items = entries(&feed(
            "<entry><title>t</title><updated>2020-01-02T00:00:00Z</updated><published>2020-01-01T00:00:00Z</published></entry>",
        ));
        assert_eq!(
            items[0].published_at,
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_link_without_rel_is_alternate() {
        let items = entries(&feed(
            r#"<entry><link rel="edit" href="http://x/edit"/><link href="http://x/post"/></entry>"#,
        ));
        assert_eq!(items[0].link.as_deref(), Some("http://x/post"));

        let items = entries(&feed(r#"<entry><link rel="enclosure" href="http://x/file.mp3"/></entry>"#));
        assert_eq!(items[0].link.as_deref(), Some("http://x/file.mp3"));

        let items = entries(&feed("<entry><title>no links</title></entry>"));
        assert_eq!(items[0].link, None);
    }

    #[test]
    fn test_content_becomes_body_and_description_fallback() {
        let items = entries(&feed(
            r#"<entry><title>t</title><content type="html">&lt;p&gt;Rich &amp;amp; full&lt;/p&gt;</content></entry>"#,
        ));
        assert_eq!(items[0].body.as_deref(), Some("<p>Rich &amp; full</p>"));
        assert_eq!(items[0].description.as_deref(), Some("Rich & full"));
    }

    #[test]
    fn test_xhtml_content_keeps_inner_markup() {
        let items = entries(&feed(
            r#"<entry><title>t</title><content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Hi <b>there</b></p></div></content></entry>"#,
        ));
        assert_eq!(items[0].body.as_deref(), Some("<p>Hi <b>there</b></p>"));
    }

    #[test]
    fn test_out_of_line_content_falls_back_to_summary() {
        let items = entries(&feed(
            r#"<entry><title>t</title><content src="http://x/c"/><summary>short</summary></entry>"#,
        ));
        assert_eq!(items[0].body.as_deref(), Some("short"));
    }

    #[test]
    fn test_unqualified_feed_and_dublin_core() {
        let items = entries(
            r#"<feed xmlns:dc="http://purl.org/dc/elements/1.1/"><entry><title>t</title><dc:creator>DC</dc:creator><author><name>Atom</name></author><dc:subject>x</dc:subject></entry></feed>"#,
        );
        assert_eq!(items[0].contributor.as_deref(), Some("DC"));
        assert_eq!(items[0].subject.as_deref(), Some("x"));
    }

    #[test]
    fn test_entry_order() {
        let items = entries(&feed(
            "<entry><id>1</id></entry><entry><id>2</id></entry>",
        ));
        let ids: Vec<_> = items.iter().map(|i| i.guid.clone().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
