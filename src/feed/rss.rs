//! RSS 2.0 (and 0.9x) entry extraction.

use super::entry::RawFeedEntry;
use super::extensions::{apply_shared_fields, plain_text, resolve_contributor, resolve_published};
use super::xml::{Element, Ns};

/// Extracts every `<item>` in document order.
///
/// Items normally live under `<channel>`; a few generators emit them as
/// siblings of the channel, so direct children of `<rss>` are read too.
pub fn extract(root: &Element) -> Vec<RawFeedEntry> {
    let in_channel = root
        .children_named(Ns::Rss, "channel")
        .flat_map(|channel| channel.children_named(Ns::Rss, "item"));
    let beside_channel = root.children_named(Ns::Rss, "item");

    in_channel.chain(beside_channel).map(extract_item).collect()
}

fn extract_item(item: &Element) -> RawFeedEntry {
    let mut entry = RawFeedEntry {
        guid: item.child_text(Ns::Rss, "guid"),
        link: item.child_text(Ns::Rss, "link"),
        title: plain_text(item.child_text(Ns::Rss, "title")),
        description: plain_text(item.child_text(Ns::Rss, "description")),
        contributor: resolve_contributor(item, &[|i| i.child_text(Ns::Rss, "author")]),
        ..RawFeedEntry::default()
    };

    resolve_published(
        &mut entry,
        &[
            item.child_text(Ns::Rss, "pubDate"),
            item.child_text(Ns::DublinCore, "date"),
        ],
    );
    apply_shared_fields(item, &mut entry);
    entry
}
