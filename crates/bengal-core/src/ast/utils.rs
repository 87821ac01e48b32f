//! Tree walking and extraction utilities.
//!
//! All functions here are pure: they never mutate their input, and
//! unrecognized shapes are skipped rather than rejected. AST walks replace
//! regex extraction over rendered HTML and keep the operations O(n).

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::AstNode;

/// One table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocItem {
    /// Anchor id (shared slug algorithm).
    pub id: String,
    /// Heading text.
    pub title: String,
    /// Display level: source level minus one, clamped to >= 1.
    pub level: usize,
}

/// Depth-first iterator over every node in a tree, parents before children.
///
/// Table cell content is traversed as well, in row order.
pub fn walk<'a>(ast: &'a [AstNode]) -> impl Iterator<Item = &'a AstNode> {
    Walk {
        stack: ast.iter().rev().collect(),
    }
}

struct Walk<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let AstNode::Table { rows, .. } = node {
            for row in rows.iter().rev() {
                for cell in row.iter().rev() {
                    self.stack.extend(cell.children.iter().rev());
                }
            }
        } else if let Some(children) = node.children() {
            self.stack.extend(children.iter().rev());
        }
        Some(node)
    }
}

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s-]+").expect("valid regex"));

/// Generate a URL-friendly slug from arbitrary heading text.
///
/// Rules: decode HTML entities, Unicode-normalize, lowercase, drop anything
/// that is not a word character, space, or hyphen, collapse whitespace and
/// hyphen runs to a single `-`, trim hyphens, and cap at 100 characters.
#[must_use]
pub fn slugify(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let normalized: String = decoded.nfkc().collect::<String>().to_lowercase();
    let cleaned = NON_SLUG.replace_all(&normalized, "");
    let hyphenated = WHITESPACE_RUN.replace_all(cleaned.trim(), "-");
    let trimmed = hyphenated.trim_matches('-');
    trimmed.chars().take(100).collect()
}

/// Concatenated text content of a single node and its descendants.
#[must_use]
pub fn extract_text(node: &AstNode) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &AstNode, out: &mut String) {
    match node {
        AstNode::Text { raw, .. } | AstNode::CodeSpan { raw, .. } | AstNode::CodeBlock { raw, .. } => {
            out.push_str(raw);
        }
        _ => {}
    }
    if let Some(children) = node.children() {
        for child in children {
            collect_text(child, out);
        }
    }
}

/// Generate the anchor id for a heading node.
#[must_use]
pub fn generate_heading_id(node: &AstNode) -> String {
    slugify(&extract_text(node))
}

/// Extract the table of contents from a tree.
///
/// One entry per heading in document order. H2 maps to level 1, H3 to
/// level 2, and so on (H1 is conventionally the page title).
#[must_use]
pub fn extract_toc(ast: &[AstNode]) -> Vec<TocItem> {
    let mut items = Vec::new();
    for node in walk(ast) {
        if let AstNode::Heading { level, .. } = node {
            items.push(TocItem {
                id: generate_heading_id(node),
                title: extract_text(node),
                level: usize::from(*level).saturating_sub(1).max(1),
            });
        }
    }
    items
}

/// Extract every link destination from a tree, in document order.
#[must_use]
pub fn extract_links(ast: &[AstNode]) -> Vec<String> {
    walk(ast)
        .filter_map(|node| match node {
            AstNode::Link { url, .. } if !url.is_empty() => Some(url.clone()),
            _ => None,
        })
        .collect()
}

/// Extract plain text for search indexing and LLM consumption.
///
/// Concatenates `raw` content and separates block elements with newlines;
/// runs of three or more newlines collapse to two, and the result is
/// trimmed.
#[must_use]
pub fn extract_plain_text(ast: &[AstNode]) -> String {
    let mut out = String::new();
    collect_plain_text(ast, &mut out);

    // Collapse runs of 3+ newlines down to a blank line.
    let mut text = String::with_capacity(out.len());
    let mut newlines = 0usize;
    for ch in out.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                text.push('\n');
            }
        } else {
            newlines = 0;
            text.push(ch);
        }
    }
    text.trim().to_string()
}

fn collect_plain_text(nodes: &[AstNode], out: &mut String) {
    for node in nodes {
        match node {
            AstNode::Text { raw, .. } | AstNode::CodeSpan { raw, .. } | AstNode::CodeBlock { raw, .. } => {
                out.push_str(raw);
            }
            AstNode::Table { rows, .. } => {
                for row in rows {
                    for cell in row {
                        collect_plain_text(&cell.children, out);
                        out.push(' ');
                    }
                    out.push('\n');
                }
            }
            _ => {}
        }
        if let Some(children) = node.children() {
            collect_plain_text(children, out);
        }
        if matches!(
            node,
            AstNode::Paragraph { .. }
                | AstNode::Heading { .. }
                | AstNode::List { .. }
                | AstNode::CodeBlock { .. }
                | AstNode::Blockquote { .. }
        ) {
            out.push('\n');
        }
    }
}

/// Render a flat TOC item list as nested `<ul class="toc">` HTML.
#[must_use]
pub fn render_toc_html(items: &[TocItem]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(items.len() * 48);
    out.push_str("<ul class=\"toc\">\n");
    let mut depth = 1usize;
    let mut open_item = false;
    for item in items {
        let level = item.level.max(1);
        if open_item && level > depth {
            // Nest inside the still-open item.
            while depth < level {
                out.push_str("<ul>\n");
                depth += 1;
            }
        } else if open_item {
            out.push_str("</li>\n");
            while depth > level {
                out.push_str("</ul>\n</li>\n");
                depth -= 1;
            }
        }
        let _ = write!(
            out,
            "<li><a href=\"#{}\">{}</a>\n",
            item.id,
            html_escape::encode_text(&item.title)
        );
        open_item = true;
    }
    if open_item {
        out.push_str("</li>\n");
    }
    while depth > 1 {
        out.push_str("</ul>\n</li>\n");
        depth -= 1;
    }
    out.push_str("</ul>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Location, TableCell};

    fn heading(level: u8, text: &str) -> AstNode {
        AstNode::Heading {
            location: Location::default(),
            level,
            children: vec![AstNode::text(Location::default(), text)],
        }
    }

    fn paragraph(text: &str) -> AstNode {
        AstNode::Paragraph {
            location: Location::default(),
            children: vec![AstNode::text(Location::default(), text)],
        }
    }

    #[test]
    fn test_walk_yields_parent_before_children() {
        let ast = vec![heading(1, "Hello"), paragraph("World")];
        let types: Vec<_> = walk(&ast).map(AstNode::node_type).collect();
        assert_eq!(types, vec!["heading", "text", "paragraph", "text"]);
    }

    #[test]
    fn test_walk_traverses_table_cells() {
        let ast = vec![AstNode::Table {
            location: Location::default(),
            rows: vec![vec![TableCell {
                header: true,
                children: vec![AstNode::text(Location::default(), "cell")],
            }]],
            align: vec![],
        }];
        assert_eq!(walk(&ast).count(), 2);
    }

    #[test]
    fn test_slugify_basics() {
        assert_eq!(slugify("Getting Started!"), "getting-started");
        assert_eq!(slugify("  Hello   World  "), "hello-world");
        assert_eq!(slugify("API &amp; Tools"), "api-tools");
        assert_eq!(slugify("--edge--"), "edge");
    }

    #[test]
    fn test_slugify_caps_length() {
        let long = "a".repeat(300);
        assert_eq!(slugify(&long).len(), 100);
    }

    #[test]
    fn test_extract_toc_maps_levels() {
        let ast = vec![heading(1, "Title"), heading(2, "Intro"), heading(4, "Deep")];
        let toc = extract_toc(&ast);
        assert_eq!(toc.len(), 3);
        assert_eq!(toc[0].level, 1); // H1 clamps to 1
        assert_eq!(toc[1].level, 1);
        assert_eq!(toc[2].level, 3);
        assert_eq!(toc[1].id, "intro");
    }

    #[test]
    fn test_extract_links() {
        let ast = vec![AstNode::Paragraph {
            location: Location::default(),
            children: vec![AstNode::Link {
                location: Location::default(),
                url: "/docs/".into(),
                title: None,
                children: vec![AstNode::text(Location::default(), "Docs")],
            }],
        }];
        assert_eq!(extract_links(&ast), vec!["/docs/".to_string()]);
    }

    #[test]
    fn test_extract_plain_text_separates_blocks() {
        let ast = vec![heading(1, "Hello"), paragraph("World")];
        assert_eq!(extract_plain_text(&ast), "Hello\nWorld");
    }

    #[test]
    fn test_extract_plain_text_collapses_newline_runs() {
        let ast = vec![
            paragraph("one"),
            AstNode::List {
                location: Location::default(),
                ordered: false,
                tight: true,
                start: None,
                items: vec![],
            },
            AstNode::Blockquote {
                location: Location::default(),
                children: vec![],
            },
            paragraph("two"),
        ];
        let text = extract_plain_text(&ast);
        assert!(!text.contains("\n\n\n"));
        assert!(text.starts_with("one"));
        assert!(text.ends_with("two"));
    }

    #[test]
    fn test_render_toc_html_nests_levels() {
        let items = vec![
            TocItem { id: "a".into(), title: "A".into(), level: 1 },
            TocItem { id: "b".into(), title: "B".into(), level: 2 },
            TocItem { id: "c".into(), title: "C".into(), level: 1 },
        ];
        let html = render_toc_html(&items);
        assert!(html.starts_with("<ul class=\"toc\">"));
        assert!(html.contains("href=\"#a\""));
        assert!(html.contains("<ul>\n<li><a href=\"#b\""));
        assert_eq!(html.matches("<ul").count(), html.matches("</ul>").count());
    }
}
