//! Syntax highlighter adapter.
//!
//! A thin wrapper over a pluggable backend producing class-annotated
//! `<span>` tokens (styled by the theme's CSS, no inline colors). The
//! default backend is syntect with its bundled syntax set. Unknown
//! languages fall back to escaped plain text inside the same wrapper div;
//! `mermaid` blocks bypass tokenization entirely for client-side
//! rendering.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// A tokenizing backend.
///
/// Implementations must be thread-safe: `highlight_many` calls them from
/// worker threads concurrently.
pub trait HighlightBackend: Send + Sync {
    /// Backend name, used as the wrapper div's CSS class.
    fn name(&self) -> &'static str;

    /// Tokenize `code` for `lang` into span-classified HTML, or `None`
    /// when the language is unknown to this backend.
    fn highlight(&self, code: &str, lang: &str) -> Option<String>;
}

/// syntect-based default backend.
pub struct SyntectBackend {
    syntaxes: SyntaxSet,
}

impl SyntectBackend {
    /// Load the bundled syntax definitions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }
}

impl Default for SyntectBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightBackend for SyntectBackend {
    fn name(&self) -> &'static str {
        "syntect"
    }

    fn highlight(&self, code: &str, lang: &str) -> Option<String> {
        let syntax = self
            .syntaxes
            .find_syntax_by_token(lang)
            .or_else(|| self.syntaxes.find_syntax_by_extension(lang))?;
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            if generator
                .parse_html_for_line_which_includes_newline(line)
                .is_err()
            {
                // Bail to the plain-text fallback on tokenizer errors.
                return None;
            }
        }
        Some(generator.finalize())
    }
}

static BACKEND: Lazy<SyntectBackend> = Lazy::new(SyntectBackend::new);

/// Highlight one code block.
///
/// Returns `<div class="<backend>">…</div>` wrapping either token spans or,
/// for unknown languages, escaped plain text. `mermaid` sources render as
/// `<div class="mermaid">…</div>` for the client-side renderer.
#[must_use]
pub fn highlight(code: &str, lang: &str) -> String {
    if lang.eq_ignore_ascii_case("mermaid") {
        return format!(
            "<div class=\"mermaid\">{}</div>\n",
            html_escape::encode_text(code)
        );
    }
    let backend: &SyntectBackend = &BACKEND;
    render_with_backend(backend, code, lang)
}

fn render_with_backend(backend: &dyn HighlightBackend, code: &str, lang: &str) -> String {
    let name = backend.name();
    match backend.highlight(code, lang) {
        Some(tokens) => format!(
            "<div class=\"{name}\" data-lang=\"{}\"><pre class=\"highlight\"><code>{tokens}</code></pre></div>\n",
            html_escape::encode_double_quoted_attribute(lang)
        ),
        None => format!(
            "<div class=\"{name}\" data-lang=\"{}\"><pre class=\"highlight\"><code>{}</code></pre></div>\n",
            html_escape::encode_double_quoted_attribute(lang),
            html_escape::encode_text(code)
        ),
    }
}

/// Highlight a batch in parallel, preserving input order.
///
/// `max_workers` caps the worker pool; `None` uses one worker per core
/// (the rayon global pool). Falls back to the global pool if a dedicated
/// pool cannot be built.
#[must_use]
pub fn highlight_many(items: &[(String, String)], max_workers: Option<usize>) -> Vec<String> {
    let run = || -> Vec<String> {
        items
            .par_iter()
            .map(|(code, lang)| highlight(code, lang))
            .collect()
    };
    match max_workers {
        Some(workers) if workers > 0 => rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_or_else(
                |e| {
                    tracing::warn!("failed to build highlight pool: {e}; using global pool");
                    run()
                },
                |pool| pool.install(run),
            ),
        _ => run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_language_gets_token_spans() {
        let html = highlight("def hello():\n    print('hi')\n", "python");
        assert!(html.starts_with("<div class=\"syntect\""));
        assert!(html.contains("<span class="));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain() {
        let html = highlight("<h1>{{ title }}</h1>\n", "definitely-not-a-language");
        assert!(html.starts_with("<div class=\"syntect\""));
        assert!(html.contains("&lt;h1&gt;"));
        assert!(!html.contains("<span class="));
    }

    #[test]
    fn test_mermaid_passthrough() {
        let html = highlight("graph LR\nA --> B\n", "mermaid");
        assert!(html.starts_with("<div class=\"mermaid\">"));
        assert!(html.contains("A --&gt; B"));
        assert!(!html.contains("syntect"));
    }

    #[test]
    fn test_batch_preserves_order_and_length() {
        let items: Vec<(String, String)> = (0..32)
            .map(|i| (format!("let x{i} = {i};\n"), "rust".to_string()))
            .collect();
        let results = highlight_many(&items, Some(4));
        assert_eq!(results.len(), items.len());
        for (i, html) in results.iter().enumerate() {
            assert!(html.contains(&format!("x{i}")), "order broken at {i}");
        }
    }

    #[test]
    fn test_batch_sequential_matches_parallel() {
        let items = vec![
            ("print('a')\n".to_string(), "python".to_string()),
            ("graph TD\n".to_string(), "mermaid".to_string()),
        ];
        let parallel = highlight_many(&items, None);
        let sequential: Vec<String> = items
            .iter()
            .map(|(code, lang)| highlight(code, lang))
            .collect();
        assert_eq!(parallel, sequential);
    }
}
