//! Owned, mutable copy of a parsed HTML tree.
//!
//! `scraper` trees are read-only and not `Send`, so the clean and tidy passes
//! copy the nodes they care about into this shape, rewrite it, and serialize
//! it back to a string.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Doctype,
    Element(ElementNode),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Fragment>,
}

impl ElementNode {
    pub fn new(name: &str, children: Vec<Fragment>) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_element_children(&self) -> bool {
        self.children
            .iter()
            .any(|child| matches!(child, Fragment::Element(_)))
    }

    /// Concatenated text of all descendants, comments excluded.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Fragment], out: &mut String) {
    for node in nodes {
        match node {
            Fragment::Text(text) => out.push_str(text),
            Fragment::Element(element) => collect_text(&element.children, out),
            Fragment::Doctype | Fragment::Comment(_) => {}
        }
    }
}

/// Top-level nodes of a body fragment.
pub(crate) fn parse_fragment(markup: &str) -> Vec<Fragment> {
    let fragment = Html::parse_fragment(markup);
    fragment
        .root_element()
        .children()
        .filter_map(to_owned_node)
        .collect()
}

/// Top-level nodes of a full document, doctype included.
pub(crate) fn parse_document(markup: &str) -> Vec<Fragment> {
    let document = Html::parse_document(markup);
    document.tree.root().children().filter_map(to_owned_node).collect()
}

fn to_owned_node(node: NodeRef<'_, Node>) -> Option<Fragment> {
    match node.value() {
        Node::Doctype(_) => Some(Fragment::Doctype),
        Node::Text(text) => Some(Fragment::Text((**text).to_string())),
        Node::Comment(comment) => Some(Fragment::Comment((**comment).to_string())),
        Node::Element(element) => Some(Fragment::Element(ElementNode {
            name: element.name().to_string(),
            attrs: element
                .attrs()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            children: node.children().filter_map(to_owned_node).collect(),
        })),
        _ => None,
    }
}

pub(crate) fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose text is written without escaping.
pub(crate) fn is_raw_text(name: &str) -> bool {
    matches!(
        name,
        "script" | "style" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext"
    )
}

pub(crate) fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn write_open_tag(element: &ElementNode, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
}

pub(crate) fn write_close_tag(element: &ElementNode, out: &mut String) {
    if !is_void(&element.name) {
        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
    }
}

/// Serialize nodes exactly as they are, no whitespace added.
pub(crate) fn serialize(nodes: &[Fragment], out: &mut String) {
    serialize_in(nodes, false, out);
}

/// Serialize an element's children, honoring raw-text elements.
pub(crate) fn serialize_children(element: &ElementNode, out: &mut String) {
    serialize_in(&element.children, is_raw_text(&element.name), out);
}

fn serialize_in(nodes: &[Fragment], raw: bool, out: &mut String) {
    for node in nodes {
        match node {
            Fragment::Doctype => out.push_str("<!DOCTYPE html>"),
            Fragment::Text(text) if raw => out.push_str(text),
            Fragment::Text(text) => escape_text(text, out),
            Fragment::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Fragment::Element(element) => {
                write_open_tag(element, out);
                serialize_children(element, out);
                write_close_tag(element, out);
            }
        }
    }
}

pub(crate) fn to_html(nodes: &[Fragment]) -> String {
    let mut out = String::new();
    serialize(nodes, &mut out);
    out
}
