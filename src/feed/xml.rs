//! Lightweight namespace-aware element tree over `quick-xml` events.
//!
//! Feeds in the wild mix namespace conventions for the same field, declare
//! prefixes they never bind, and break off mid-document. The tree keeps both
//! the resolved namespace URI and the literal prefix of every element so that
//! lookups can fall back to conventional prefixes, and a syntax error after
//! the root element has opened keeps everything read so far.

use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted from a feed document.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum XmlError {
    /// The document never produced a root element.
    #[error("XML parse error: {0}")]
    Syntax(String),

    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Document has no root element")]
    NoRoot,
}

/// A namespace family as it appears in feeds: its known URIs plus the prefix
/// authors conventionally use for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ns {
    /// Unqualified RSS 2.0 core elements.
    Rss,
    Atom,
    DublinCore,
    Content,
    Media,
}

impl Ns {
    fn uris(self) -> &'static [&'static str] {
        match self {
            Ns::Rss => &[],
            Ns::Atom => &["http://www.w3.org/2005/atom", "http://purl.org/atom/ns#"],
            Ns::DublinCore => &["http://purl.org/dc/elements/1.1", "http://purl.org/dc/terms"],
            Ns::Content => &["http://purl.org/rss/1.0/modules/content"],
            Ns::Media => &["http://search.yahoo.com/mrss", "http://video.search.yahoo.com/mrss"],
        }
    }

    fn conventional_prefix(self) -> Option<&'static str> {
        match self {
            Ns::Rss => None,
            Ns::Atom => Some("atom"),
            Ns::DublinCore => Some("dc"),
            Ns::Content => Some("content"),
            Ns::Media => Some("media"),
        }
    }

    /// Atom documents occasionally omit their namespace declaration.
    fn accepts_unqualified(self) -> bool {
        matches!(self, Ns::Rss | Ns::Atom)
    }

    fn accepts(self, namespace: Option<&str>, prefix: Option<&str>) -> bool {
        match (namespace, prefix) {
            (Some(uri), _) => {
                let uri = uri.trim_end_matches('/');
                self.uris().iter().any(|known| uri.eq_ignore_ascii_case(known))
            }
            (None, Some(prefix)) => self
                .conventional_prefix()
                .is_some_and(|p| p.eq_ignore_ascii_case(prefix)),
            (None, None) => self.accepts_unqualified(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Resolved namespace URI, when the prefix (or default namespace) is bound.
    pub namespace: Option<String>,
    /// Literal prefix as written, bound or not.
    pub prefix: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn is(&self, ns: Ns, local: &str) -> bool {
        self.name.eq_ignore_ascii_case(local)
            && ns.accepts(self.namespace.as_deref(), self.prefix.as_deref())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn children_named<'a>(
        &'a self,
        ns: Ns,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(ns, local))
    }

    pub fn child(&self, ns: Ns, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(ns, local))
    }

    /// Trimmed text of the first matching child, if any is non-blank.
    pub fn child_text(&self, ns: Ns, local: &str) -> Option<String> {
        self.children_named(ns, local)
            .map(|e| e.text())
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
    }

    /// Unqualified attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.prefix.is_none() && a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Concatenated character data of this element and all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Serialized markup of the children, as authored.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(node, &mut out);
        }
        out
    }
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{name}"),
        None => name.to_string(),
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&escape(t.as_str())),
        Node::Element(e) => {
            let tag = qualified(e.prefix.as_deref(), &e.name);
            out.push('<');
            out.push_str(&tag);
            for attr in &e.attributes {
                out.push(' ');
                out.push_str(&qualified(attr.prefix.as_deref(), &attr.name));
                out.push_str("=\"");
                out.push_str(&escape(attr.value.as_str()));
                out.push('"');
            }
            if e.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &e.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
    }
}

/// Named HTML entities that show up in hand-rolled feeds, on top of the five
/// XML builtins. Anything else is kept literally.
fn resolve_entity(entity: &str) -> Option<&'static str> {
    resolve_predefined_entity(entity).or(match entity {
        "nbsp" => Some("\u{a0}"),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "lsquo" => Some("\u{2018}"),
        "rsquo" => Some("\u{2019}"),
        "ldquo" => Some("\u{201c}"),
        "rdquo" => Some("\u{201d}"),
        "hellip" => Some("\u{2026}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "trade" => Some("\u{2122}"),
        _ => None,
    })
}

fn resolve_to_owned(result: ResolveResult<'_>) -> Option<String> {
    match result {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

fn build_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Element {
    let qname = start.name();
    let prefix = qname
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let name = String::from_utf8_lossy(qname.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr_result in start.attributes().with_checks(false) {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::debug!(element = %name, error = %e, "Skipping malformed attribute");
                continue;
            }
        };
        let key = attr.key;
        if key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push(Attribute {
            prefix: key
                .prefix()
                .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
            name: String::from_utf8_lossy(key.local_name().as_ref()).into_owned(),
            value,
        });
    }

    Element {
        namespace,
        prefix,
        name,
        attributes,
        children: Vec::new(),
    }
}

fn push_text(stack: &mut [Element], text: String) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(&text);
    } else {
        parent.children.push(Node::Text(text));
    }
}

/// Attaches a finished element to its parent, or yields it as the root.
fn close(stack: &mut Vec<Element>, element: Element) -> Option<Element> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            None
        }
        None => Some(element),
    }
}

/// Folds every still-open element into its parent and returns the root.
fn unwind(mut stack: Vec<Element>) -> Option<Element> {
    let mut root = None;
    while let Some(element) = stack.pop() {
        root = close(&mut stack, element);
    }
    root
}

/// Parses a feed document into an element tree.
///
/// Fails only when no root element could be read at all. A syntax error
/// later in the document is logged and the partial tree returned.
///
/// XXE: quick-xml 0.37 never expands `<!ENTITY>` declarations (see SEC-002
/// in Cargo.toml); unknown entities are kept as literal text.
pub fn parse_document(bytes: &[u8]) -> Result<Element, XmlError> {
    let mut reader = NsReader::from_reader(bytes);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
    }

    let mut stack: Vec<Element> = Vec::new();
    let mut root_seen = false;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_resolved_event_into(&mut buf);
        match event {
            Ok((ns, Event::Start(e))) => {
                let namespace = resolve_to_owned(ns);
                let element = build_element(&reader, namespace, &e);
                stack.push(element);
                root_seen = true;
                if stack.len() > MAX_DEPTH {
                    return Err(XmlError::MaxDepthExceeded(MAX_DEPTH));
                }
            }
            Ok((ns, Event::Empty(e))) => {
                let namespace = resolve_to_owned(ns);
                let element = build_element(&reader, namespace, &e);
                root_seen = true;
                if let Some(root) = close(&mut stack, element) {
                    return Ok(root);
                }
            }
            Ok((_, Event::End(_))) => {
                if let Some(element) = stack.pop() {
                    if let Some(root) = close(&mut stack, element) {
                        return Ok(root);
                    }
                }
            }
            Ok((_, Event::Text(e))) => {
                let text = match e.unescape_with(resolve_entity) {
                    Ok(t) => t.into_owned(),
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                push_text(&mut stack, text);
            }
            Ok((_, Event::CData(e))) => {
                push_text(&mut stack, String::from_utf8_lossy(&e).into_owned());
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) if !root_seen => return Err(XmlError::Syntax(e.to_string())),
            Err(e) => {
                tracing::warn!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Malformed XML, keeping elements parsed so far"
                );
                break;
            }
        }
        buf.clear();
    }

    unwind(stack).ok_or(XmlError::NoRoot)
}
