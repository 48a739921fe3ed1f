use std::fmt;

use super::xml::{parse_document, Element, Ns};

/// The closed set of feed formats the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss2,
    Atom,
    Unknown,
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedFormat::Rss2 => "rss2",
            FeedFormat::Atom => "atom",
            FeedFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies a parsed document by its root element.
///
/// `<rss>` with a `<channel>` is RSS 2.0 (0.9x documents share the layout);
/// `<feed>` in the Atom namespace, or with no namespace at all, is Atom.
/// Everything else, RDF-based RSS 1.0 and HTML pages included, is unknown.
pub fn detect(root: &Element) -> FeedFormat {
    if root.is(Ns::Rss, "rss") && root.child(Ns::Rss, "channel").is_some() {
        FeedFormat::Rss2
    } else if root.is(Ns::Atom, "feed") {
        FeedFormat::Atom
    } else {
        FeedFormat::Unknown
    }
}

/// A fetched body after detection: the element tree plus its format.
///
/// Bodies that are not XML at all are `Unknown` with no tree.
#[derive(Debug)]
pub struct SniffedDocument {
    pub format: FeedFormat,
    pub root: Option<Element>,
}

/// Parses and classifies a fetched body in one step.
pub fn sniff(bytes: &[u8]) -> SniffedDocument {
    match parse_document(bytes) {
        Ok(root) => SniffedDocument {
            format: detect(&root),
            root: Some(root),
        },
        Err(e) => {
            tracing::debug!(error = %e, "Fetched body is not an XML document");
            SniffedDocument {
                format: FeedFormat::Unknown,
                root: None,
            }
        }
    }
}
