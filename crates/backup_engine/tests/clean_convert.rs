use backup_engine::{
    clean_markup, derive_markup, tidy_document, Converter, Html2MdConverter, PlainMarkupConverter,
    Template,
};
use pretty_assertions::assert_eq;

const TEMPLATE: &str = "<!DOCTYPE html><html><head><title>{{title}}</title></head><body><main>{{content}}</main></body></html>";

fn clean(raw: &str) -> String {
    clean_markup(raw, "Title", &Template::new(TEMPLATE), 80)
}

#[test]
fn styled_spans_become_emphasis() {
    let out = clean(
        r#"<p><span style="font-style: italic">a</span> <span style="font-weight: bold">b</span> <span style="font-weight: 700; font-style: italic">c</span></p>"#,
    );
    assert!(out.contains("<p><em>a</em> <b>b</b> <b><em>c</em></b></p>"), "{out}");
}

#[test]
fn plain_spans_are_unwrapped() {
    let out = clean(r#"<p><span class="x">hello</span> world</p><div><span><a href="/q">link</a></span></div>"#);
    assert!(out.contains("<p>hello world</p>"), "{out}");
    assert!(out.contains(r#"<div><span><a href="/q">link</a></span></div>"#), "{out}");
}

#[test]
fn presentation_attributes_are_stripped() {
    let out = clean(r#"<p class="q-text" style="color: red" data-x="1">t</p>"#);
    assert!(out.contains(r#"<p data-x="1">t</p>"#), "{out}");
}

#[test]
fn long_leaf_text_is_wrapped() {
    let out = clean_markup(
        "<p>alpha beta gamma delta</p>",
        "T",
        &Template::new(TEMPLATE),
        11,
    );
    assert!(out.contains("<p>alpha beta\ngamma\ndelta</p>"), "{out}");
}

#[test]
fn document_layout_is_stable() {
    let out = clean("<p>one</p><!-- dropped --><ul><li>two</li></ul>");
    assert_eq!(
        out,
        "<!DOCTYPE html>
<html>
  <head>
    <title>Title</title>
  </head>
  <body>
    <main>
      <h1>Title</h1>
      <p>one</p>
      <ul>
        <li>two</li>
      </ul>
    </main>
  </body>
</html>
"
    );
    assert_eq!(out, clean("<p>one</p><!-- dropped --><ul><li>two</li></ul>"));
}

#[test]
fn title_is_escaped() {
    let out = clean_markup("<p>x</p>", "A < B & C", &Template::new(TEMPLATE), 80);
    assert!(out.contains("<title>A &lt; B &amp; C</title>"), "{out}");
    assert!(out.contains("<h1>A &lt; B &amp; C</h1>"), "{out}");
}

#[test]
fn tidy_keeps_preformatted_text() {
    let out = tidy_document("<html><body><pre>  a\n    b</pre></body></html>");
    assert!(out.contains("<pre>  a\n    b</pre>"), "{out}");
}

#[test]
fn derived_markup_keeps_the_heading() {
    let cleaned = clean(r#"<p>Rust is <span style="font-weight: bold">fast</span>.</p>"#);
    assert_eq!(
        derive_markup(&PlainMarkupConverter, &cleaned),
        "# Title\n\nRust is **fast**."
    );
}

#[test]
fn plain_markup_handles_lists_links_and_quotes() {
    let md = PlainMarkupConverter.to_markdown(
        r#"<html><body><ul><li>a</li><li>b</li></ul><ol><li>x</li><li>y</li></ol><p>see <a href="https://x.y/">here</a></p><blockquote><p>q1</p><p>q2</p></blockquote><hr><p>end</p></body></html>"#,
    );
    assert_eq!(
        md,
        "- a\n- b\n\n1. x\n2. y\n\nsee [here](https://x.y/)\n\n> q1\n>\n> q2\n\n* * *\n\nend"
    );
}

#[test]
fn html2md_output_starts_with_the_underlined_title() {
    let cleaned = clean_markup(
        "<p>Memory safety without garbage collection.</p>",
        "My Title",
        &Template::new(TEMPLATE),
        80,
    );
    let md = derive_markup(&Html2MdConverter, &cleaned);
    let heading: Vec<&str> = md.lines().take(2).collect();
    assert_eq!(heading, vec!["My Title", "=========="]);
    assert!(md.contains("Memory safety without garbage collection."), "{md}");
    assert!(!md.contains("<p>"), "{md}");
}
