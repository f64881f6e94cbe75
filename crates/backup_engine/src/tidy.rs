//! Minify-then-pretty-print pass applied to every cleaned document.

use crate::markup::{self, is_void, write_close_tag, write_open_tag, ElementNode, Fragment};

/// Attributes dropped when their value is empty.
const DROP_WHEN_EMPTY: [&str; 6] = ["class", "id", "style", "title", "lang", "dir"];
const INDENT: &str = "  ";

/// Drop comments and empty presentational attributes, sort attributes, then
/// re-indent block elements two spaces per level. Inline runs stay on their
/// parent's line.
pub fn tidy_document(markup: &str) -> String {
    let mut nodes = markup::parse_document(markup);
    minify(&mut nodes);
    let mut printer = Printer::default();
    printer.children(&nodes, 0);
    printer.finish()
}

fn minify(nodes: &mut Vec<Fragment>) {
    nodes.retain(|node| !matches!(node, Fragment::Comment(_)));
    for node in nodes.iter_mut() {
        if let Fragment::Element(element) = node {
            element.attrs.retain(|(key, value)| {
                !(value.trim().is_empty() && DROP_WHEN_EMPTY.contains(&key.as_str()))
            });
            element.attrs.sort_by(|a, b| a.0.cmp(&b.0));
            minify(&mut element.children);
        }
    }
}

fn is_inline(name: &str) -> bool {
    matches!(
        name,
        "a" | "abbr"
            | "b"
            | "bdi"
            | "bdo"
            | "br"
            | "button"
            | "cite"
            | "code"
            | "data"
            | "del"
            | "dfn"
            | "em"
            | "i"
            | "img"
            | "input"
            | "ins"
            | "kbd"
            | "label"
            | "mark"
            | "q"
            | "s"
            | "samp"
            | "select"
            | "small"
            | "span"
            | "strong"
            | "sub"
            | "sup"
            | "time"
            | "u"
            | "var"
            | "wbr"
    )
}

/// Content written verbatim after the open tag.
fn is_preformatted(name: &str) -> bool {
    matches!(name, "pre" | "textarea" | "script" | "style")
}

fn is_block(node: &Fragment) -> bool {
    match node {
        Fragment::Element(element) => !is_inline(&element.name),
        Fragment::Doctype => true,
        Fragment::Text(_) | Fragment::Comment(_) => false,
    }
}

#[derive(Default)]
struct Printer {
    lines: Vec<String>,
}

impl Printer {
    fn line(&mut self, depth: usize, content: &str) {
        self.lines.push(format!("{}{}", INDENT.repeat(depth), content));
    }

    fn children(&mut self, nodes: &[Fragment], depth: usize) {
        let mut inline = String::new();
        for node in nodes {
            match node {
                Fragment::Doctype => {
                    self.flush(&mut inline, depth);
                    self.line(depth, "<!DOCTYPE html>");
                }
                Fragment::Element(element) if is_block(node) => {
                    self.flush(&mut inline, depth);
                    self.block(element, depth);
                }
                other => markup::serialize(std::slice::from_ref(other), &mut inline),
            }
        }
        self.flush(&mut inline, depth);
    }

    fn flush(&mut self, inline: &mut String, depth: usize) {
        let run = inline.trim();
        if !run.is_empty() {
            let run = run.to_string();
            self.line(depth, &run);
        }
        inline.clear();
    }

    fn block(&mut self, element: &ElementNode, depth: usize) {
        let mut open = String::new();
        write_open_tag(element, &mut open);
        if is_void(&element.name) {
            self.line(depth, &open);
            return;
        }
        let mut close = String::new();
        write_close_tag(element, &mut close);

        let preformatted = is_preformatted(&element.name);
        if preformatted || !element.children.iter().any(is_block) {
            let mut body = String::new();
            markup::serialize_children(element, &mut body);
            let body = if preformatted { body.as_str() } else { body.trim() };
            self.line(depth, &format!("{open}{body}{close}"));
            return;
        }

        self.line(depth, &open);
        self.children(&element.children, depth + 1);
        self.line(depth, &close);
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reindents_blocks_and_keeps_inline_runs() {
        let out = tidy_document(
            "<!doctype html><html><head><title>T</title></head>\
             <body><!-- note --><div id=\"\"><p>a <b>b</b></p><ul><li>x</li></ul></div></body></html>",
        );
        assert_eq!(
            out,
            "<!DOCTYPE html>\n<html>\n  <head>\n    <title>T</title>\n  </head>\n  <body>\n    \
             <div>\n      <p>a <b>b</b></p>\n      <ul>\n        <li>x</li>\n      </ul>\n    \
             </div>\n  </body>\n</html>\n"
        );
    }

    #[test]
    fn attributes_are_sorted() {
        let out = tidy_document(r#"<html><body><a title="t" href="/x" class="">l</a></body></html>"#);
        assert!(out.contains(r#"<a href="/x" title="t">l</a>"#), "{out}");
    }
}
