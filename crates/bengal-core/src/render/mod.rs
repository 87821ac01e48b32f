//! AST → HTML rendering.
//!
//! Single-pass writer backed by a preallocated string builder. Directive
//! nodes are expanded through the global registry at render time; raw HTML
//! nodes are emitted verbatim. Footnotes accumulate during the pass and
//! render as a single trailing section in definition order.

pub mod highlight;
pub mod transform;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::ast::{AstNode, TableAlign, TableCell};
use crate::ast::utils::generate_heading_id;
use crate::directives::{DirectiveContext, DirectiveInvocation, DirectiveRegistry};

/// Knobs the orchestrator sets per render.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Run fenced code through the highlighter adapter.
    pub highlighting: bool,
    /// Sandbox root for `include` directives; `None` disables inclusion.
    pub include_root: Option<PathBuf>,
}

/// Render a document to HTML.
#[must_use]
pub fn render_document(ast: &[AstNode], options: &RenderOptions) -> String {
    let mut definitions: Vec<(&str, &[AstNode])> = Vec::new();
    collect_footnote_defs(ast, &mut definitions);
    let order: BTreeMap<&str, usize> = definitions
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (*id, i + 1))
        .collect();

    let mut renderer = HtmlRenderer {
        out: String::with_capacity(1024 + ast.len() * 128),
        options,
        registry: DirectiveRegistry::global(),
        footnote_order: order,
    };
    renderer.render_nodes(ast, false);
    renderer.append_footnotes(&definitions);
    renderer.out
}

fn collect_footnote_defs<'a>(nodes: &'a [AstNode], out: &mut Vec<(&'a str, &'a [AstNode])>) {
    for node in nodes {
        if let AstNode::FootnoteDef {
            identifier,
            children,
            ..
        } = node
        {
            if !out.iter().any(|(id, _)| *id == identifier.as_str()) {
                out.push((identifier.as_str(), children.as_slice()));
            }
        }
        if let Some(children) = node.children() {
            collect_footnote_defs(children, out);
        }
    }
}

struct HtmlRenderer<'a> {
    out: String,
    options: &'a RenderOptions,
    registry: &'static DirectiveRegistry,
    footnote_order: BTreeMap<&'a str, usize>,
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn escape_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

impl HtmlRenderer<'_> {
    fn render_nodes(&mut self, nodes: &[AstNode], tight: bool) {
        for node in nodes {
            self.render_node(node, tight);
        }
    }

    #[allow(clippy::too_many_lines)]
    fn render_node(&mut self, node: &AstNode, tight: bool) {
        match node {
            AstNode::Heading {
                level, children, ..
            } => {
                let id = generate_heading_id(node);
                let _ = write!(self.out, "<h{level} id=\"{id}\">");
                self.render_nodes(children, false);
                let _ = writeln!(self.out, "</h{level}>");
            }
            AstNode::Paragraph { children, .. } => {
                // Tight list items drop the paragraph wrapper.
                if tight {
                    self.render_nodes(children, false);
                    self.out.push('\n');
                } else {
                    self.out.push_str("<p>");
                    self.render_nodes(children, false);
                    self.out.push_str("</p>\n");
                }
            }
            AstNode::Text { raw, .. } => self.out.push_str(&escape(raw)),
            AstNode::CodeSpan { raw, .. } => {
                let _ = write!(self.out, "<code>{}</code>", escape(raw));
            }
            AstNode::Emphasis { children, .. } => {
                self.out.push_str("<em>");
                self.render_nodes(children, false);
                self.out.push_str("</em>");
            }
            AstNode::Strong { children, .. } => {
                self.out.push_str("<strong>");
                self.render_nodes(children, false);
                self.out.push_str("</strong>");
            }
            AstNode::Strikethrough { children, .. } => {
                self.out.push_str("<del>");
                self.render_nodes(children, false);
                self.out.push_str("</del>");
            }
            AstNode::HardBreak { .. } => self.out.push_str("<br>\n"),
            AstNode::SoftBreak { .. } => self.out.push('\n'),
            AstNode::Link {
                url,
                title,
                children,
                ..
            } => {
                let _ = write!(self.out, "<a href=\"{}\"", escape_attr(url));
                if let Some(title) = title {
                    let _ = write!(self.out, " title=\"{}\"", escape_attr(title));
                }
                self.out.push('>');
                self.render_nodes(children, false);
                self.out.push_str("</a>");
            }
            AstNode::Image {
                src, alt, title, ..
            } => {
                let _ = write!(
                    self.out,
                    "<img src=\"{}\" alt=\"{}\"",
                    escape_attr(src),
                    escape_attr(alt)
                );
                if let Some(title) = title {
                    let _ = write!(self.out, " title=\"{}\"", escape_attr(title));
                }
                self.out.push('>');
            }
            AstNode::List {
                ordered,
                tight: list_tight,
                start,
                items,
                ..
            } => {
                if *ordered {
                    match start {
                        Some(n) if *n != 1 => {
                            let _ = writeln!(self.out, "<ol start=\"{n}\">");
                        }
                        _ => self.out.push_str("<ol>\n"),
                    }
                } else {
                    self.out.push_str("<ul>\n");
                }
                self.render_nodes(items, *list_tight);
                self.out
                    .push_str(if *ordered { "</ol>\n" } else { "</ul>\n" });
            }
            AstNode::ListItem {
                checked, children, ..
            } => {
                match checked {
                    Some(done) => {
                        self.out.push_str(
                            "<li class=\"task-list-item\"><input type=\"checkbox\" \
                             class=\"task-list-item-checkbox\" disabled",
                        );
                        if *done {
                            self.out.push_str(" checked");
                        }
                        self.out.push_str("> ");
                    }
                    None => self.out.push_str("<li>"),
                }
                self.render_nodes(children, tight);
                // Drop the trailing newline inside tight items for compact output.
                if tight && self.out.ends_with('\n') {
                    self.out.pop();
                }
                self.out.push_str("</li>\n");
            }
            AstNode::CodeBlock { info, raw, .. } => self.render_code_block(info.as_deref(), raw),
            AstNode::Blockquote { children, .. } => {
                self.out.push_str("<blockquote>\n");
                self.render_nodes(children, false);
                self.out.push_str("</blockquote>\n");
            }
            AstNode::ThematicBreak { .. } => self.out.push_str("<hr>\n"),
            AstNode::Table { rows, align, .. } => self.render_table(rows, align),
            AstNode::FootnoteRef { identifier, .. } => {
                let label = self
                    .footnote_order
                    .get(identifier.as_str())
                    .map_or_else(|| identifier.clone(), ToString::to_string);
                let id = escape_attr(identifier);
                let _ = write!(
                    self.out,
                    "<sup class=\"footnote-ref\"><a href=\"#fn-{id}\" id=\"fnref-{id}\">{label}</a></sup>"
                );
            }
            // Definitions render once, in the trailing footnotes section.
            AstNode::FootnoteDef { .. } => {}
            AstNode::RawHtml { content, .. } => self.out.push_str(content),
            AstNode::Directive {
                name,
                title,
                options,
                children,
                location,
            } => {
                let context = DirectiveContext {
                    include_root: self.options.include_root.as_deref(),
                };
                match self.registry.get(name) {
                    Some(handler) => {
                        let invocation = DirectiveInvocation {
                            name,
                            title: title.as_deref(),
                            options,
                            children,
                            location: *location,
                            context: &context,
                        };
                        let expanded = handler.expand(&invocation);
                        self.render_nodes(&expanded, false);
                    }
                    // Unknown directives render their content unchanged.
                    None => self.render_nodes(children, false),
                }
            }
        }
    }

    fn render_code_block(&mut self, info: Option<&str>, raw: &str) {
        let lang = info.and_then(|i| i.split_whitespace().next());
        if let Some(lang) = lang {
            if self.options.highlighting || lang == "mermaid" {
                self.out.push_str(&highlight::highlight(raw, lang));
                return;
            }
            let _ = writeln!(
                self.out,
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_attr(lang),
                escape(raw)
            );
            return;
        }
        let _ = writeln!(self.out, "<pre><code>{}</code></pre>", escape(raw));
    }

    fn render_table(&mut self, rows: &[Vec<TableCell>], align: &[TableAlign]) {
        self.out
            .push_str("<div class=\"table-wrapper\">\n<table>\n");
        let header_rows: Vec<_> = rows.iter().filter(|r| r.iter().any(|c| c.header)).collect();
        let body_rows: Vec<_> = rows.iter().filter(|r| !r.iter().any(|c| c.header)).collect();
        if !header_rows.is_empty() {
            self.out.push_str("<thead>\n");
            for row in header_rows {
                self.render_table_row(row, align);
            }
            self.out.push_str("</thead>\n");
        }
        if !body_rows.is_empty() {
            self.out.push_str("<tbody>\n");
            for row in body_rows {
                self.render_table_row(row, align);
            }
            self.out.push_str("</tbody>\n");
        }
        self.out.push_str("</table>\n</div>\n");
    }

    fn render_table_row(&mut self, row: &[TableCell], align: &[TableAlign]) {
        self.out.push_str("<tr>");
        for (index, cell) in row.iter().enumerate() {
            let tag = if cell.header { "th" } else { "td" };
            let style = match align.get(index).copied().unwrap_or_default() {
                TableAlign::None => String::new(),
                TableAlign::Left => " style=\"text-align: left\"".to_string(),
                TableAlign::Center => " style=\"text-align: center\"".to_string(),
                TableAlign::Right => " style=\"text-align: right\"".to_string(),
            };
            let _ = write!(self.out, "<{tag}{style}>");
            self.render_nodes(&cell.children, false);
            let _ = write!(self.out, "</{tag}>");
        }
        // Rows end with a newline for readable output.
        self.out.push_str("</tr>\n");
    }

    fn append_footnotes(&mut self, definitions: &[(&str, &[AstNode])]) {
        if definitions.is_empty() {
            return;
        }
        self.out
            .push_str("<section class=\"footnotes\">\n<ol>\n");
        for (identifier, children) in definitions {
            let id = escape_attr(identifier);
            let _ = write!(self.out, "<li id=\"fn-{id}\">");
            // Inline the definition body so the backref sits on the same line.
            let mut body = HtmlRenderer {
                out: String::new(),
                options: self.options,
                registry: self.registry,
                footnote_order: self.footnote_order.clone(),
            };
            body.render_nodes(children, true);
            let body = body.out;
            self.out.push_str(body.trim_end());
            let _ = writeln!(
                self.out,
                " <a href=\"#fnref-{id}\" class=\"footnote-backref\">&#8617;</a></li>"
            );
        }
        self.out.push_str("</ol>\n</section>\n");
    }
}
