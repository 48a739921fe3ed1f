use std::borrow::Cow;

use scraper::{ElementRef, Html};

/// Elements whose boundaries separate words when markup is flattened.
const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "blockquote",
    "br",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

/// Elements whose text content is never part of a synopsis.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Flattens an HTML fragment into plain text.
///
/// Entities are decoded, tags removed, and runs of whitespace collapsed to a
/// single space. Block-level boundaries become word breaks so that
/// `<p>one</p><p>two</p>` reads as `one two` rather than `onetwo`.
///
/// Returns `Cow::Borrowed` when the input has no markup, no entities and no
/// whitespace to collapse.
///
/// # Examples
///
/// ```
/// use feedcrawl::util::strip_markup;
///
/// assert_eq!(strip_markup("<p>Dr. <b>Biden</b> &amp; friends</p>"), "Dr. Biden & friends");
/// assert_eq!(strip_markup("plain"), "plain");
/// ```
pub fn strip_markup(input: &str) -> Cow<'_, str> {
    if !input.contains(['<', '&']) {
        return collapse_whitespace(input);
    }

    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    push_text(fragment.root_element(), &mut out);

    Cow::Owned(collapse_whitespace(&out).into_owned())
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }
            let is_block = BLOCK_ELEMENTS.contains(&name);
            if is_block {
                out.push(' ');
            }
            push_text(child_element, out);
            if is_block {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Trims the ends and collapses interior whitespace runs to one space.
pub fn collapse_whitespace(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    let needs_work = trimmed
        .as_bytes()
        .windows(2)
        .any(|w| w[0].is_ascii_whitespace() && w[1].is_ascii_whitespace())
        || trimmed
            .chars()
            .any(|c| c.is_whitespace() && c != ' ');

    if !needs_work {
        return Cow::Borrowed(trimmed);
    }

    Cow::Owned(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Returns the trimmed value, or `None` when nothing but whitespace remains.
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
