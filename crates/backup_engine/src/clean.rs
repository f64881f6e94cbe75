//! Raw answer markup to a standalone presentation document.

use crate::markup::{self, ElementNode, Fragment};
use crate::template::Template;
use crate::tidy::tidy_document;

/// Turn captured answer markup into the cleaned document for `title`.
///
/// The output only depends on the arguments.
pub fn clean_markup(raw: &str, title: &str, template: &Template, width: usize) -> String {
    let mut nodes = markup::parse_fragment(raw);
    nodes = nodes.into_iter().map(normalize_emphasis).collect();
    nodes = unwrap_plain_spans(nodes);
    wrap_leaves(&mut nodes, width);
    strip_presentation_attrs(&mut nodes);

    let mut escaped_title = String::new();
    markup::escape_text(title, &mut escaped_title);
    let content = format!("<h1>{}</h1>{}", escaped_title, markup::to_html(&nodes));
    tidy_document(&template.render(&escaped_title, &content))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Emphasis {
    italic: bool,
    bold: bool,
}

fn emphasis_of(style: &str) -> Emphasis {
    let mut emphasis = Emphasis::default();
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let value = value.trim().to_ascii_lowercase();
        match property.trim().to_ascii_lowercase().as_str() {
            "font-style" => emphasis.italic |= value == "italic",
            "font-weight" => emphasis.bold |= value == "bold" || value == "700",
            _ => {}
        }
    }
    emphasis
}

/// Styled spans become `<em>`, `<b>`, or `<b><em>`.
fn normalize_emphasis(node: Fragment) -> Fragment {
    let mut element = match node {
        Fragment::Element(element) => element,
        other => return other,
    };
    element.children = element
        .children
        .into_iter()
        .map(normalize_emphasis)
        .collect();
    if element.name != "span" {
        return Fragment::Element(element);
    }
    let emphasis = element
        .attr("style")
        .map(emphasis_of)
        .unwrap_or_default();
    let children = std::mem::take(&mut element.children);
    let replacement = match (emphasis.bold, emphasis.italic) {
        (true, true) => ElementNode::new(
            "b",
            vec![Fragment::Element(ElementNode::new("em", children))],
        ),
        (false, true) => ElementNode::new("em", children),
        (true, false) => ElementNode::new("b", children),
        (false, false) => {
            element.children = children;
            element
        }
    };
    Fragment::Element(replacement)
}

/// A span without element children is replaced by its text. Spans that do
/// have element children stay, and their descendants are visited.
fn unwrap_plain_spans(nodes: Vec<Fragment>) -> Vec<Fragment> {
    nodes
        .into_iter()
        .map(|node| match node {
            Fragment::Element(element)
                if element.name == "span" && !element.has_element_children() =>
            {
                Fragment::Text(element.text_content())
            }
            Fragment::Element(mut element) => {
                element.children = unwrap_plain_spans(element.children);
                Fragment::Element(element)
            }
            other => other,
        })
        .collect()
}

fn wrap_leaves(nodes: &mut [Fragment], width: usize) {
    for node in nodes {
        let Fragment::Element(element) = node else {
            continue;
        };
        if element.has_element_children() {
            wrap_leaves(&mut element.children, width);
            continue;
        }
        let text = element.text_content();
        if text.chars().count() > width {
            element.children = vec![Fragment::Text(wrap_text(&text, width))];
        }
    }
}

/// Greedy word wrap at single spaces. A word longer than `width` gets a line
/// of its own.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split(' ') {
        let word_len = word.chars().count();
        if current_len + word_len + 1 > width {
            let line = current.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
            current.clear();
            current_len = 0;
        }
        current.push_str(word);
        current.push(' ');
        current_len += word_len + 1;
    }
    let line = current.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
    lines.join("\n")
}

fn strip_presentation_attrs(nodes: &mut [Fragment]) {
    for node in nodes {
        if let Fragment::Element(element) = node {
            element.attrs.retain(|(key, _)| {
                !key.eq_ignore_ascii_case("class") && !key.eq_ignore_ascii_case("style")
            });
            strip_presentation_attrs(&mut element.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_parsing_accepts_numeric_bold() {
        assert_eq!(
            emphasis_of("font-weight: 700; color: red"),
            Emphasis {
                italic: false,
                bold: true
            }
        );
        assert_eq!(
            emphasis_of("FONT-STYLE:italic"),
            Emphasis {
                italic: true,
                bold: false
            }
        );
    }

    #[test]
    fn wrap_never_starts_with_an_empty_line() {
        assert_eq!(
            wrap_text("supercalifragilistic word", 5),
            "supercalifragilistic\nword"
        );
        assert_eq!(wrap_text("aa bb cc", 6), "aa bb\ncc");
    }
}
