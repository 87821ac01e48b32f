//! The full content pipeline: parse → transform → render, plus the AST
//! extraction utilities the orchestrator consumes.

use bengal_core::{
    add_baseurl, create_markdown_parser, extract_links, extract_plain_text, extract_toc,
    normalize_md_links, Metadata, Parser,
};

fn parser() -> Parser {
    create_markdown_parser(Some("patitas"))
        .expect("parser")
        .with_highlighting(false)
}

fn normalize(html: &str) -> String {
    // Strip whitespace between tags and collapse runs, per the
    // AST↔HTML equivalence definition.
    let mut out = String::with_capacity(html.len());
    let mut after_gt = false;
    let mut in_ws = false;
    for c in html.chars() {
        if c.is_whitespace() {
            if after_gt {
                continue;
            }
            in_ws = true;
            continue;
        }
        if in_ws && c != '<' {
            out.push(' ');
        }
        in_ws = false;
        after_gt = c == '>';
        out.push(c);
    }
    out
}

#[test]
fn parse_is_deterministic() {
    let p = parser();
    let source = "# T\n\n- a\n- b\n\n| x | y |\n|---|---|\n| 1 | 2 |\n";
    let first = p.parse(source, &Metadata::default()).unwrap();
    let second = p.parse(source, &Metadata::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn ast_mode_matches_html_mode() {
    let p = parser();
    let sources = [
        "# Title\n\nA paragraph with *em*, **strong**, `code`, and ~~del~~.\n",
        "- one\n- two\n  - nested\n\n> quoted\n\n---\n",
        "| a | b |\n|:--|--:|\n| 1 | 2 |\n",
        "- [x] done[^1]\n\n[^1]: note\n",
        ":::{note}\nAdmonition body\n:::\n",
    ];
    for source in sources {
        let direct = p.parse(source, &Metadata::default()).unwrap();
        let ast = p.parse_to_ast(source, &Metadata::default()).unwrap();
        let via_ast = p.render_ast(&ast);
        assert_eq!(
            normalize(&via_ast),
            normalize(&direct),
            "mismatch for source: {source:?}"
        );
    }
}

#[test]
fn md_link_normalization_plus_baseurl() {
    let p = parser();
    let ast = p
        .parse_to_ast("[Guide](/docs/guide.md)", &Metadata::default())
        .unwrap();
    let transformed = add_baseurl(&normalize_md_links(&ast), "/bengal");
    let html = p.render_ast(&transformed);
    assert!(
        html.contains("href=\"/bengal/docs/guide/\""),
        "got: {html}"
    );

    let ast = p
        .parse_to_ast("[x](./_index.md)", &Metadata::default())
        .unwrap();
    let html = p.render_ast(&normalize_md_links(&ast));
    assert!(html.contains("href=\"./\""), "got: {html}");
}

#[test]
fn baseurl_transform_is_idempotent() {
    let p = parser();
    let ast = p
        .parse_to_ast("[a](/x/) ![i](/img.png)", &Metadata::default())
        .unwrap();
    let once = add_baseurl(&ast, "/bengal");
    let twice = add_baseurl(&once, "/bengal");
    assert_eq!(once, twice);
}

#[test]
fn task_list_and_footnotes_round_trip() {
    let p = parser();
    let html = p
        .parse("- [x] done[^1]\n\n[^1]: note\n", &Metadata::default())
        .unwrap();
    assert!(html.contains("class=\"task-list-item\""));
    assert!(html.contains("type=\"checkbox\""));
    assert!(html.contains("disabled checked"));
    assert_eq!(html.matches("<section class=\"footnotes\">").count(), 1);
    assert!(html.contains("&#8617;"));
}

#[test]
fn toc_extraction_levels_and_ids() {
    let p = parser();
    let source = "# Page Title\n\n## Getting Started\n\n### Install & Run\n\n## Usage\n";
    let ast = p.parse_to_ast(source, &Metadata::default()).unwrap();
    let toc = extract_toc(&ast);
    assert_eq!(toc.len(), 4);
    assert_eq!(toc[1].title, "Getting Started");
    assert_eq!(toc[1].id, "getting-started");
    assert_eq!(toc[1].level, 1);
    assert_eq!(toc[2].id, "install-run");
    assert_eq!(toc[2].level, 2);

    // Rendered headings carry the same anchors.
    let html = p.render_ast(&ast);
    assert!(html.contains("id=\"getting-started\""));
}

#[test]
fn plain_text_extraction_for_search() {
    let p = parser();
    let source = "# Title\n\nBody with [a link](/x/) and `code`.\n\n```rust\nfn main() {}\n```\n";
    let ast = p.parse_to_ast(source, &Metadata::default()).unwrap();
    let text = extract_plain_text(&ast);
    assert!(text.contains("Title"));
    assert!(text.contains("Body with a link and code."));
    assert!(text.contains("fn main() {}"));
    assert!(!text.contains("<"));
    assert!(!text.contains("\n\n\n"));
}

#[test]
fn link_extraction_sees_nested_urls() {
    let p = parser();
    let source = "> A [quoted link](/deep/)\n\n- item with [another](/docs/page/)\n";
    let ast = p.parse_to_ast(source, &Metadata::default()).unwrap();
    let links = extract_links(&ast);
    assert_eq!(links, vec!["/deep/".to_string(), "/docs/page/".to_string()]);
}

#[test]
fn transforms_never_touch_code() {
    let p = parser();
    let source = "```\n[not a link](/raw.md)\n```\n\n[real](/docs/page.md)\n";
    let ast = p.parse_to_ast(source, &Metadata::default()).unwrap();
    let html = p.render_ast(&add_baseurl(&normalize_md_links(&ast), "/b"));
    assert!(html.contains("href=\"/b/docs/page/\""));
    assert!(html.contains("[not a link](/raw.md)"));
}

#[test]
fn mermaid_blocks_pass_through_untokenized() {
    let p = parser();
    let html = p
        .parse("```mermaid\ngraph LR\nA --> B\n```\n", &Metadata::default())
        .unwrap();
    assert!(html.contains("<div class=\"mermaid\">"));
    assert!(html.contains("A --&gt; B"));
}

#[test]
fn cross_references_resolve_through_parser() {
    let mut xref = bengal_core::XrefIndex::default();
    xref.by_slug
        .insert("install".into(), "/docs/install/".into());
    let mut p = parser();
    p.enable_cross_references(xref);
    let html = p.parse("See [[install]] first.", &Metadata::default()).unwrap();
    assert!(html.contains("href=\"/docs/install/\""));
}

#[test]
fn linear_time_smoke_on_many_paragraphs() {
    // Not a benchmark, just a guard against accidental quadratic blowups:
    // thousands of paragraphs should parse without noticeable stall.
    let source: String = (0..5_000)
        .map(|i| format!("Paragraph number {i} with some *inline* content.\n\n"))
        .collect();
    let p = parser();
    let started = std::time::Instant::now();
    let html = p.parse(&source, &Metadata::default()).unwrap();
    assert!(html.len() > source.len() / 2);
    assert!(
        started.elapsed() < std::time::Duration::from_secs(10),
        "parse took {:?}",
        started.elapsed()
    );
}
