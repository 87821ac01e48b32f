//! Markdown parser engines with a unified interface.
//!
//! The default `patitas` engine is a hand-rolled two-phase parser: an O(n)
//! line scanner builds block structure (with the directive extension), and
//! a delimiter-stack inline pass expands text runs. Every `parse` call
//! constructs fresh state, so a single [`Parser`] value can be shared
//! across threads.
//!
//! The optional `python-markdown` engine (cargo feature of the same name)
//! is a compatibility wrapper over pulldown-cmark. It produces HTML only;
//! link rewriting for it goes through the unified HTML post-transform
//! instead of AST transforms.
//!
//! ```
//! use bengal_core::parser::create_markdown_parser;
//!
//! let parser = create_markdown_parser(None)?;
//! let html = parser.parse("# Hello\n\nWorld.", &Default::default())?;
//! assert!(html.contains("<h1"));
//! # Ok::<(), bengal_core::Error>(())
//! ```

mod block;
#[cfg(feature = "python-markdown")]
mod compat;
mod inline;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{utils, Document};
use crate::config::Engine;
use crate::diagnostics::Diagnostic;
use crate::directives;
use crate::error::{Error, Result};
use crate::render;

/// Page front-matter passed alongside the source.
///
/// The parser itself does not interpret metadata; it participates in cache
/// keys and is forwarded to directive handlers that need page context.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Cross-reference lookup tables built by the discovery layer.
///
/// `[[key]]` inline references resolve against these maps; unresolved
/// references degrade to literal text with a warning diagnostic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefIndex {
    /// Explicit ids (`id:` prefix).
    pub by_id: BTreeMap<String, String>,
    /// Source paths relative to the content root.
    pub by_path: BTreeMap<String, String>,
    /// Page slugs.
    pub by_slug: BTreeMap<String, String>,
    /// Heading slugs.
    pub by_heading: BTreeMap<String, String>,
}

impl XrefIndex {
    /// Resolve a reference key to a URL.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&str> {
        if let Some(id) = key.strip_prefix("id:") {
            return self.by_id.get(id).map(String::as_str);
        }
        self.by_slug
            .get(key)
            .or_else(|| self.by_path.get(key))
            .or_else(|| self.by_heading.get(key))
            .or_else(|| self.by_id.get(key))
            .map(String::as_str)
    }
}

/// Result of a full AST-mode parse.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// The parsed tree.
    pub ast: Document,
    /// Fence, directive-contract, and cross-reference diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

/// A configured markdown parser.
///
/// Construction validates the engine selection; parsing never fails for
/// content reasons after that.
#[derive(Debug, Clone)]
pub struct Parser {
    engine: Engine,
    xref: Option<XrefIndex>,
    highlighting: bool,
    include_root: Option<std::path::PathBuf>,
}

/// Create a markdown parser instance.
///
/// `engine` is the configuration value from `markdown.parser`; `None`
/// selects the default. Unknown names and engines that were not compiled in
/// are configuration errors with a suggested fix.
pub fn create_markdown_parser(engine: Option<&str>) -> Result<Parser> {
    let engine = match engine {
        Some(name) => Engine::from_config_name(name)?,
        None => Engine::default(),
    };
    Parser::with_engine(engine)
}

impl Parser {
    /// Construct a parser for a resolved engine.
    pub fn with_engine(engine: Engine) -> Result<Self> {
        #[cfg(not(feature = "python-markdown"))]
        if engine == Engine::PythonMarkdown {
            return Err(Error::Config(
                "python-markdown engine requested but not compiled in. \
                 Rebuild with `--features python-markdown`, or set \
                 markdown.parser = \"patitas\" (default)"
                    .into(),
            ));
        }
        Ok(Self {
            engine,
            xref: None,
            highlighting: true,
            include_root: None,
        })
    }

    /// Default parser (patitas engine, highlighting on).
    pub fn new() -> Result<Self> {
        Self::with_engine(Engine::default())
    }

    /// Disable or enable code-fence highlighting.
    #[must_use]
    pub fn with_highlighting(mut self, enabled: bool) -> Self {
        self.highlighting = enabled;
        self
    }

    /// Sandbox root for `include`/`literalinclude` path resolution.
    #[must_use]
    pub fn with_include_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.include_root = Some(root.into());
        self
    }

    /// Attach a cross-reference index; `[[key]]` refs resolve against it.
    pub fn enable_cross_references(&mut self, xref: XrefIndex) {
        self.xref = Some(xref);
    }

    /// Version string for cache compatibility checks.
    ///
    /// Bumped whenever parse or render output changes shape, so cached
    /// parsed content from older revisions misses cleanly.
    #[must_use]
    pub fn parser_version(&self) -> String {
        format!("{}-0.4-ast1", self.engine.config_name())
    }

    /// The engine this parser was constructed with.
    #[must_use]
    pub const fn engine(&self) -> Engine {
        self.engine
    }

    /// Parse markdown to HTML.
    pub fn parse(&self, source: &str, metadata: &Metadata) -> Result<String> {
        match self.engine {
            Engine::Patitas => {
                let result = self.parse_document(source, metadata)?;
                log_diagnostics(&result.diagnostics);
                Ok(self.render_ast(&result.ast))
            }
            Engine::PythonMarkdown => self.parse_compat(source),
        }
    }

    /// Parse markdown to a typed AST.
    pub fn parse_to_ast(&self, source: &str, metadata: &Metadata) -> Result<Document> {
        let result = self.parse_document(source, metadata)?;
        log_diagnostics(&result.diagnostics);
        Ok(result.ast)
    }

    /// Parse markdown to an AST plus the diagnostics produced on the way.
    pub fn parse_document(&self, source: &str, _metadata: &Metadata) -> Result<ParseResult> {
        if self.engine == Engine::PythonMarkdown {
            return Err(Error::Parse(
                "the python-markdown engine is HTML-only and cannot produce an AST; \
                 use the patitas engine for AST mode"
                    .into(),
            ));
        }
        let (segments, mut diagnostics) = directives::fence::scan_segments(source);
        let mut ctx = block::BlockContext {
            xref: self.xref.as_ref(),
            diagnostics: &mut diagnostics,
        };
        let ast = block::parse_segments(&segments, &mut ctx);
        directives::validate_tree(&ast, &mut diagnostics);
        Ok(ParseResult { ast, diagnostics })
    }

    /// Render a previously parsed AST to HTML.
    #[must_use]
    pub fn render_ast(&self, ast: &Document) -> String {
        render::render_document(
            ast,
            &render::RenderOptions {
                highlighting: self.highlighting,
                include_root: self.include_root.clone(),
            },
        )
    }

    /// Parse and also return TOC HTML plus structured TOC items.
    pub fn parse_with_toc(
        &self,
        source: &str,
        metadata: &Metadata,
    ) -> Result<(String, String, Vec<utils::TocItem>)> {
        match self.engine {
            Engine::Patitas => {
                let result = self.parse_document(source, metadata)?;
                log_diagnostics(&result.diagnostics);
                let html = self.render_ast(&result.ast);
                let toc_items = utils::extract_toc(&result.ast);
                let toc_html = utils::render_toc_html(&toc_items);
                Ok((html, toc_html, toc_items))
            }
            Engine::PythonMarkdown => {
                let html = self.parse_compat(source)?;
                Ok((html, String::new(), Vec::new()))
            }
        }
    }

    #[cfg(feature = "python-markdown")]
    fn parse_compat(&self, source: &str) -> Result<String> {
        compat::parse_html(source)
    }

    #[cfg(not(feature = "python-markdown"))]
    #[allow(clippy::unused_self)]
    fn parse_compat(&self, _source: &str) -> Result<String> {
        // Construction already rejects the engine; this is unreachable in
        // practice but keeps the match arms total.
        Err(Error::Config(
            "python-markdown engine not compiled in".into(),
        ))
    }
}

/// Parse a standalone markdown fragment with default settings.
///
/// Used by the `include` directive when splicing other files; diagnostics
/// are logged rather than surfaced since the fragment has no page of its
/// own.
pub(crate) fn parse_fragment(source: &str) -> Document {
    let (segments, mut diagnostics) = directives::fence::scan_segments(source);
    let mut ctx = block::BlockContext {
        xref: None,
        diagnostics: &mut diagnostics,
    };
    let ast = block::parse_segments(&segments, &mut ctx);
    log_diagnostics(&diagnostics);
    ast
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        match d.severity {
            crate::diagnostics::DiagnosticSeverity::Error => {
                tracing::warn!(line = ?d.line, "parse error: {}", d.message);
            }
            crate::diagnostics::DiagnosticSeverity::Warn => {
                tracing::warn!(line = ?d.line, "{}", d.message);
            }
            crate::diagnostics::DiagnosticSeverity::Info => {
                tracing::debug!(line = ?d.line, "{}", d.message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSeverity;

    fn parser() -> Parser {
        Parser::new().unwrap().with_highlighting(false)
    }

    #[test]
    fn test_parse_is_deterministic() {
        let p = parser();
        let source = "# Title\n\nSome *text* with [a link](/x/).\n";
        let a = p.parse(source, &Metadata::default()).unwrap();
        let b = p.parse(source, &Metadata::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ast_and_html_modes_agree() {
        let p = parser();
        let source = "## Section\n\n- one\n- two\n\n> quote\n";
        let direct = p.parse(source, &Metadata::default()).unwrap();
        let ast = p.parse_to_ast(source, &Metadata::default()).unwrap();
        assert_eq!(normalize(&p.render_ast(&ast)), normalize(&direct));
    }

    fn normalize(html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut last_gt = false;
        for c in html.chars() {
            if c.is_whitespace() && last_gt {
                continue;
            }
            last_gt = c == '>';
            out.push(c);
        }
        out
    }

    #[test]
    fn test_unclosed_directive_keeps_content() {
        let p = parser();
        let source = ":::{note}\n:::{tip}\ncontent\n:::\n";
        let result = p.parse_document(source, &Metadata::default()).unwrap();
        let errors: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("note"));
        let html = p.render_ast(&result.ast);
        assert!(html.contains("content"));
    }

    #[test]
    fn test_xref_index_resolution_order() {
        let mut xref = XrefIndex::default();
        xref.by_id.insert("install".into(), "/by-id/".into());
        xref.by_slug.insert("install".into(), "/by-slug/".into());
        assert_eq!(xref.resolve("install"), Some("/by-slug/"));
        assert_eq!(xref.resolve("id:install"), Some("/by-id/"));
        assert_eq!(xref.resolve("missing"), None);
    }

    #[test]
    fn test_parser_version_includes_engine() {
        assert!(parser().parser_version().starts_with("patitas"));
    }

    #[cfg(not(feature = "python-markdown"))]
    #[test]
    fn test_unavailable_engine_fails_construction() {
        let err = create_markdown_parser(Some("python-markdown")).unwrap_err();
        assert_eq!(err.category(), "config");
        assert!(err.to_string().contains("--features python-markdown"));
    }

    #[test]
    fn test_unknown_engine_rejected() {
        assert!(create_markdown_parser(Some("asciidoc")).is_err());
    }
}
