//! Pure AST-level link transformations.
//!
//! These replace regex rewriting of rendered HTML: they cannot touch URLs
//! inside code blocks, they handle quoting edge cases by construction, and
//! they operate on structured data. Each function returns a fresh tree and
//! leaves its input untouched.
//!
//! The orchestrator applies them in a fixed order:
//! [`normalize_md_links`] then [`add_baseurl`], then rendering.

use super::{AstNode, TableCell};

/// Transform every link URL and image source in a tree.
///
/// The generic building block for the concrete transforms below. `f` maps
/// old URLs to new ones; nodes without URLs are copied through with their
/// children transformed recursively.
#[must_use]
pub fn transform_links(ast: &[AstNode], f: &dyn Fn(&str) -> String) -> Vec<AstNode> {
    ast.iter().map(|node| transform_node(node, f)).collect()
}

fn transform_node(node: &AstNode, f: &dyn Fn(&str) -> String) -> AstNode {
    match node {
        AstNode::Link {
            location,
            url,
            title,
            children,
        } => AstNode::Link {
            location: *location,
            url: f(url),
            title: title.clone(),
            children: transform_links(children, f),
        },
        AstNode::Image {
            location,
            src,
            alt,
            title,
        } => AstNode::Image {
            location: *location,
            src: f(src),
            alt: alt.clone(),
            title: title.clone(),
        },
        AstNode::Heading {
            location,
            level,
            children,
        } => AstNode::Heading {
            location: *location,
            level: *level,
            children: transform_links(children, f),
        },
        AstNode::Paragraph { location, children } => AstNode::Paragraph {
            location: *location,
            children: transform_links(children, f),
        },
        AstNode::Emphasis { location, children } => AstNode::Emphasis {
            location: *location,
            children: transform_links(children, f),
        },
        AstNode::Strong { location, children } => AstNode::Strong {
            location: *location,
            children: transform_links(children, f),
        },
        AstNode::Strikethrough { location, children } => AstNode::Strikethrough {
            location: *location,
            children: transform_links(children, f),
        },
        AstNode::List {
            location,
            ordered,
            tight,
            start,
            items,
        } => AstNode::List {
            location: *location,
            ordered: *ordered,
            tight: *tight,
            start: *start,
            items: transform_links(items, f),
        },
        AstNode::ListItem {
            location,
            checked,
            children,
        } => AstNode::ListItem {
            location: *location,
            checked: *checked,
            children: transform_links(children, f),
        },
        AstNode::Blockquote { location, children } => AstNode::Blockquote {
            location: *location,
            children: transform_links(children, f),
        },
        AstNode::FootnoteDef {
            location,
            identifier,
            children,
        } => AstNode::FootnoteDef {
            location: *location,
            identifier: identifier.clone(),
            children: transform_links(children, f),
        },
        AstNode::Directive {
            location,
            name,
            title,
            options,
            children,
        } => AstNode::Directive {
            location: *location,
            name: name.clone(),
            title: title.clone(),
            options: options.clone(),
            children: transform_links(children, f),
        },
        AstNode::Table {
            location,
            rows,
            align,
        } => AstNode::Table {
            location: *location,
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| TableCell {
                            header: cell.header,
                            children: transform_links(&cell.children, f),
                        })
                        .collect()
                })
                .collect(),
            align: align.clone(),
        },
        // Leaf nodes (text, code, breaks, raw HTML) carry no URLs.
        other => other.clone(),
    }
}

/// Rewrite `.md` links to clean URLs.
///
/// - `path/_index.md` → `path/` (bare `_index.md` → `./`)
/// - `path/index.md` → `path/` (bare `index.md` → `./`)
/// - any other `x.md` → `x/`
#[must_use]
pub fn normalize_md_links(ast: &[AstNode]) -> Vec<AstNode> {
    transform_links(ast, &normalize_md_url)
}

pub(crate) fn normalize_md_url(url: &str) -> String {
    if !url.ends_with(".md") {
        return url.to_string();
    }
    if let Some(prefix) = url.strip_suffix("/_index.md") {
        return if prefix.is_empty() {
            "./".to_string()
        } else {
            format!("{prefix}/")
        };
    }
    if url == "_index.md" {
        return "./".to_string();
    }
    if let Some(prefix) = url.strip_suffix("/index.md") {
        return format!("{prefix}/");
    }
    if url == "index.md" {
        return "./".to_string();
    }
    format!("{}/", &url[..url.len() - 3])
}

/// Prepend `baseurl` to internal absolute links and image sources.
///
/// Only URLs beginning with a single `/` are touched; protocol-relative
/// (`//…`), external (`http(s)://`), anchor (`#…`), and relative paths pass
/// through, as do URLs already carrying the prefix. Idempotent.
#[must_use]
pub fn add_baseurl(ast: &[AstNode], baseurl: &str) -> Vec<AstNode> {
    let base = baseurl.trim_end_matches('/').to_string();
    if base.is_empty() {
        return ast.to_vec();
    }
    transform_links(ast, &move |url: &str| prefix_baseurl(url, &base))
}

pub(crate) fn prefix_baseurl(url: &str, base: &str) -> String {
    if !url.starts_with('/') || url.starts_with("//") {
        return url.to_string();
    }
    if url == base || url.starts_with(&format!("{base}/")) {
        return url.to_string();
    }
    format!("{base}{url}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Location;

    fn link(url: &str) -> AstNode {
        AstNode::Link {
            location: Location::default(),
            url: url.into(),
            title: None,
            children: vec![AstNode::text(Location::default(), "x")],
        }
    }

    fn first_url(ast: &[AstNode]) -> &str {
        match &ast[0] {
            AstNode::Link { url, .. } => url,
            other => panic!("expected link, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_normalize_md_links() {
        let cases = [
            ("./folder-mode.md", "./folder-mode/"),
            ("../other.md", "../other/"),
            ("sibling.md", "sibling/"),
            ("./_index.md", "./"),
            ("_index.md", "./"),
            ("index.md", "./"),
            ("docs/index.md", "docs/"),
            ("path/page.md", "path/page/"),
            ("/docs/guide.md", "/docs/guide/"),
            ("https://example.com/x", "https://example.com/x"),
        ];
        for (input, expected) in cases {
            let out = normalize_md_links(&[link(input)]);
            assert_eq!(first_url(&out), expected, "input: {input}");
        }
    }

    #[test]
    fn test_add_baseurl_internal_only() {
        let cases = [
            ("/docs/guide/", "/bengal/docs/guide/"),
            ("/bengal/docs/", "/bengal/docs/"),
            ("/bengal", "/bengal"),
            ("//cdn.example.com/x", "//cdn.example.com/x"),
            ("https://example.com/", "https://example.com/"),
            ("#section", "#section"),
            ("../other/", "../other/"),
        ];
        for (input, expected) in cases {
            let out = add_baseurl(&[link(input)], "/bengal");
            assert_eq!(first_url(&out), expected, "input: {input}");
        }
    }

    #[test]
    fn test_add_baseurl_transforms_images() {
        let ast = vec![AstNode::Image {
            location: Location::default(),
            src: "/assets/logo.png".into(),
            alt: "logo".into(),
            title: None,
        }];
        let out = add_baseurl(&ast, "/bengal/");
        match &out[0] {
            AstNode::Image { src, .. } => assert_eq!(src, "/bengal/assets/logo.png"),
            other => panic!("expected image, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_add_baseurl_idempotent() {
        let once = add_baseurl(&[link("/docs/")], "/bengal");
        let twice = add_baseurl(&once, "/bengal");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let ast = vec![link("/docs/guide.md")];
        let _ = normalize_md_links(&ast);
        assert_eq!(first_url(&ast), "/docs/guide.md");
    }

    proptest::proptest! {
        #[test]
        fn prop_baseurl_prefixing_is_idempotent(url in "[a-zA-Z0-9/._#:-]{0,40}") {
            let once = prefix_baseurl(&url, "/base");
            proptest::prop_assert_eq!(prefix_baseurl(&once, "/base"), once);
        }

        #[test]
        fn prop_normalized_urls_never_end_in_md(url in "[a-zA-Z0-9/._-]{0,40}") {
            let normalized = normalize_md_url(&url);
            proptest::prop_assert!(!normalized.ends_with(".md"));
            // Fixed point: a second pass changes nothing.
            proptest::prop_assert_eq!(normalize_md_url(&normalized), normalized);
        }
    }

    #[test]
    fn test_transforms_reach_nested_links() {
        let ast = vec![AstNode::Blockquote {
            location: Location::default(),
            children: vec![AstNode::Paragraph {
                location: Location::default(),
                children: vec![link("/deep/")],
            }],
        }];
        let out = add_baseurl(&ast, "/b");
        let urls = crate::ast::utils::extract_links(&out);
        assert_eq!(urls, vec!["/b/deep/".to_string()]);
    }
}
