//! Unified HTML post-transform.
//!
//! The fallback/optimization path for rendered HTML strings, used when AST
//! transforms are unavailable (the legacy engine) or when re-processing
//! cached HTML. Combines three passes with cheap rejection checks so pages
//! with nothing to rewrite skip the regex machinery entirely:
//!
//! 1. Jinja block delimiters `{%` / `%}` become entities (variable braces
//!    pass through untouched).
//! 2. `.md` hrefs rewrite to clean URLs, same rules as the AST transform.
//! 3. Internal `href`/`src` attributes gain the baseurl prefix.
//!
//! Behavior matches `ast::transforms` on equivalent inputs, and the
//! transform never fails the build: there is no fallible step, so the
//! output is always a complete string.

use memchr::memmem;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::Config;

// Match both quote styles explicitly (the regex crate has no backreferences).
static MD_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href=(?:"([^"]*\.md)"|'([^']*\.md)')"#).expect("valid regex")
});
static INTERNAL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"(href|src)=(?:"(/[^/"#][^"]*)"|'(/[^/'#][^']*)')"##).expect("valid regex")
});

/// Optimized multi-pass HTML transformer.
///
/// Stateless after construction; share one instance across render threads.
#[derive(Debug, Clone)]
pub struct HybridHtmlTransformer {
    baseurl: String,
}

impl HybridHtmlTransformer {
    /// `baseurl` may be empty to disable internal-link prefixing.
    #[must_use]
    pub fn new(baseurl: &str) -> Self {
        let mut baseurl = baseurl.trim_end_matches('/').to_string();
        if !baseurl.is_empty()
            && !baseurl.starts_with("http://")
            && !baseurl.starts_with("https://")
            && !baseurl.starts_with('/')
        {
            baseurl.insert(0, '/');
        }
        Self { baseurl }
    }

    /// Transform rendered HTML.
    #[must_use]
    pub fn transform(&self, html: &str) -> String {
        if html.is_empty() {
            return String::new();
        }
        // Jinja escaping first; plain replace, no patterns involved.
        let mut result = html.replace("{%", "&#123;%").replace("%}", "%&#125;");

        if memmem::find(result.as_bytes(), b".md").is_some() {
            result = MD_LINK
                .replace_all(&result, |caps: &Captures<'_>| {
                    let (quote, path) = match (caps.get(1), caps.get(2)) {
                        (Some(m), _) => ('"', m.as_str()),
                        (_, Some(m)) => ('\'', m.as_str()),
                        _ => return caps[0].to_string(),
                    };
                    let clean = crate::ast::transforms::normalize_md_url(path);
                    format!("href={quote}{clean}{quote}")
                })
                .into_owned();
        }

        if !self.baseurl.is_empty() && memmem::find(result.as_bytes(), b"=\"/").is_some() {
            result = INTERNAL_LINK
                .replace_all(&result, |caps: &Captures<'_>| {
                    let attr = &caps[1];
                    let (quote, path) = match (caps.get(2), caps.get(3)) {
                        (Some(m), _) => ('"', m.as_str()),
                        (_, Some(m)) => ('\'', m.as_str()),
                        _ => return caps[0].to_string(),
                    };
                    let prefixed =
                        crate::ast::transforms::prefix_baseurl(path, &self.baseurl);
                    format!("{attr}={quote}{prefixed}{quote}")
                })
                .into_owned();
        }

        result
    }
}

/// Build a transformer from site configuration.
#[must_use]
pub fn create_transformer(config: &Config) -> HybridHtmlTransformer {
    HybridHtmlTransformer::new(&config.baseurl())
}
