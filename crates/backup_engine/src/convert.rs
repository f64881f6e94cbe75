use backup_core::DerivedConverterKind;
use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        html2md::parse_html(html)
    }
}

pub fn converter_for(kind: DerivedConverterKind) -> Box<dyn Converter> {
    match kind {
        DerivedConverterKind::Builtin => Box::new(PlainMarkupConverter),
        DerivedConverterKind::Html2md => Box::new(Html2MdConverter),
    }
}

/// Markdown for a cleaned document. Converting a whole document repeats the
/// title (the `<title>` line, then a blank line) ahead of the `<h1>`, so the
/// first two lines are dropped when there are more than two.
pub fn derive_markup(converter: &dyn Converter, cleaned: &str) -> String {
    let markdown = converter.to_markdown(cleaned);
    let lines: Vec<&str> = markdown.split('\n').collect();
    let kept = if lines.len() > 2 { &lines[2..] } else { &lines[..] };
    kept.join("\n").trim().to_string()
}

/// Small document walker emitting ATX headings, `**` bold and `_` emphasis.
/// Blocks are separated by a blank line.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainMarkupConverter;

impl Converter for PlainMarkupConverter {
    fn to_markdown(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut ctx = MarkupContext::default();
        for child in document.tree.root().children() {
            visit_node(child, &mut ctx);
        }
        ctx.into_output()
    }
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Bullet,
    Ordered(usize),
}

#[derive(Default)]
struct MarkupContext {
    builder: String,
    /// Newlines owed before the next text.
    pending_breaks: usize,
    lists: Vec<ListKind>,
}

impl MarkupContext {
    fn into_output(self) -> String {
        self.builder.trim().to_string()
    }

    fn at_line_start(&self) -> bool {
        self.builder.is_empty() || self.builder.ends_with('\n') || self.pending_breaks > 0
    }

    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if self.at_line_start() || self.builder.ends_with(' ') {
                    continue;
                }
                self.builder.push(' ');
            } else {
                self.push_str(&ch.to_string());
            }
        }
    }

    /// Write markup verbatim, settling owed breaks first.
    fn push_str(&mut self, text: &str) {
        if self.pending_breaks > 0 {
            while self.builder.ends_with(' ') {
                self.builder.pop();
            }
            if !self.builder.is_empty() {
                let have = self.builder.len() - self.builder.trim_end_matches('\n').len();
                for _ in have..self.pending_breaks {
                    self.builder.push('\n');
                }
            }
            self.pending_breaks = 0;
        }
        self.builder.push_str(text);
    }

    fn block_break(&mut self) {
        self.pending_breaks = self.pending_breaks.max(2);
    }

    fn line_break(&mut self) {
        self.pending_breaks = self.pending_breaks.max(1);
    }
}

fn visit_node(node: NodeRef<'_, Node>, ctx: &mut MarkupContext) {
    match node.value() {
        Node::Text(text) => ctx.append_text(text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, ctx);
            }
        }
        _ => {
            for child in node.children() {
                visit_node(child, ctx);
            }
        }
    }
}

fn visit_children(element: ElementRef<'_>, ctx: &mut MarkupContext) {
    for child in element.children() {
        visit_node(child, ctx);
    }
}

fn visit_element(element: ElementRef<'_>, ctx: &mut MarkupContext) {
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = usize::from(tag.as_bytes()[1] - b'0');
            ctx.block_break();
            ctx.push_str(&format!("{} ", "#".repeat(level)));
            visit_children(element, ctx);
            ctx.block_break();
        }
        "b" | "strong" => wrap_inline(element, ctx, "**"),
        "em" | "i" => wrap_inline(element, ctx, "_"),
        "code" => wrap_inline(element, ctx, "`"),
        "a" => handle_anchor(element, ctx),
        "img" => {
            if let Some(src) = element.value().attr("src").map(str::trim) {
                let alt = element.value().attr("alt").unwrap_or_default();
                ctx.push_str(&format!("![{}]({})", alt.trim(), src));
            }
        }
        "br" => {
            ctx.line_break();
        }
        "hr" => {
            ctx.block_break();
            ctx.push_str("* * *");
            ctx.block_break();
        }
        "pre" => {
            ctx.block_break();
            let body: String = element.text().collect();
            ctx.push_str(&format!("```\n{}\n```", body.trim_end_matches('\n')));
            ctx.block_break();
        }
        "ul" | "ol" => {
            let kind = if tag == "ol" {
                ListKind::Ordered(0)
            } else {
                ListKind::Bullet
            };
            if ctx.lists.is_empty() {
                ctx.block_break();
            } else {
                ctx.line_break();
            }
            ctx.lists.push(kind);
            visit_children(element, ctx);
            ctx.lists.pop();
            if ctx.lists.is_empty() {
                ctx.block_break();
            } else {
                ctx.line_break();
            }
        }
        "li" => {
            ctx.line_break();
            let depth = ctx.lists.len().saturating_sub(1);
            let marker = match ctx.lists.last_mut() {
                Some(ListKind::Ordered(n)) => {
                    *n += 1;
                    format!("{n}. ")
                }
                _ => "- ".to_string(),
            };
            ctx.push_str(&format!("{}{}", "  ".repeat(depth), marker));
            visit_children(element, ctx);
            ctx.line_break();
        }
        "blockquote" => {
            let mut inner = MarkupContext::default();
            visit_children(element, &mut inner);
            let quoted = inner
                .into_output()
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {line}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            if !quoted.is_empty() {
                ctx.block_break();
                ctx.push_str(&quoted);
                ctx.block_break();
            }
        }
        "title" | "p" | "div" | "section" | "article" | "header" | "footer" | "nav"
        | "figure" | "figcaption" | "table" | "tr" | "address" | "main" => {
            ctx.block_break();
            visit_children(element, ctx);
            ctx.block_break();
        }
        "script" | "style" | "noscript" | "iframe" | "template" | "meta" | "link" => {}
        _ => visit_children(element, ctx),
    }
}

fn wrap_inline(element: ElementRef<'_>, ctx: &mut MarkupContext, marker: &str) {
    let text: String = element.text().collect();
    if text.trim().is_empty() {
        visit_children(element, ctx);
        return;
    }
    ctx.push_str(marker);
    visit_children(element, ctx);
    while ctx.builder.ends_with(' ') {
        ctx.builder.pop();
    }
    ctx.push_str(marker);
}

fn handle_anchor(element: ElementRef<'_>, ctx: &mut MarkupContext) {
    let href = element
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'));
    match href {
        Some(href) => {
            ctx.push_str("[");
            visit_children(element, ctx);
            ctx.push_str(&format!("]({href})"));
        }
        None => visit_children(element, ctx),
    }
}
