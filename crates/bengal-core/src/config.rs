//! Typed configuration for the content-processing core.
//!
//! The full site configuration (CLI flags, profiles, theme settings) is
//! owned by the orchestrator; this module types only the keys the core
//! consumes: the markdown engine selection and the site base URL.
//!
//! ```toml
//! [site]
//! baseurl = "/bengal"
//!
//! [markdown]
//! parser = "patitas"  # default
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Markdown parser engines the core can construct.
///
/// `Patitas` is the default hand-rolled O(n) engine with full AST and
/// directive support. `PythonMarkdown` is the legacy compatibility engine,
/// compiled in only with the `python-markdown` cargo feature; it produces
/// HTML directly and relies on the unified HTML post-transform for link
/// rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    /// Default typed-AST engine.
    Patitas,
    /// Legacy HTML-only compatibility engine (optional).
    PythonMarkdown,
}

impl Engine {
    /// Parse an engine name from configuration.
    ///
    /// The legacy name `"mistune"` is accepted with a deprecation warning
    /// and aliased to the default engine. Unknown names are a configuration
    /// error whose message lists the valid choices.
    pub fn from_config_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "patitas" => Ok(Self::Patitas),
            "mistune" => {
                tracing::warn!(
                    "markdown.parser = \"mistune\" is deprecated; using \"patitas\". \
                     Update your config to parser = \"patitas\"."
                );
                Ok(Self::Patitas)
            }
            "python-markdown" | "python_markdown" | "markdown" => Ok(Self::PythonMarkdown),
            other => Err(Error::Config(format!(
                "Unsupported markdown engine: {other}. Choose from: 'patitas', 'python-markdown'. \
                 Set markdown.parser to 'patitas' (default) or 'python-markdown' in config"
            ))),
        }
    }

    /// Canonical configuration name for this engine.
    #[must_use]
    pub const fn config_name(self) -> &'static str {
        match self {
            Self::Patitas => "patitas",
            Self::PythonMarkdown => "python-markdown",
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::Patitas
    }
}

/// `[markdown]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Engine name as written in config; resolved via [`Engine::from_config_name`].
    pub parser: Option<String>,
    /// Whether fenced code blocks run through the highlighter adapter.
    pub highlighting: Option<bool>,
}

/// `[site]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL prefix for internal links (e.g. `/bengal`). Empty disables
    /// baseurl prefixing.
    pub baseurl: Option<String>,
}

/// The subset of site configuration the content core reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[site]` keys.
    pub site: SiteConfig,
    /// `[markdown]` keys.
    pub markdown: MarkdownConfig,
}

impl Config {
    /// Parse a configuration document from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("invalid config: {e}")))
    }

    /// Resolve the configured engine, falling back to the default.
    pub fn engine(&self) -> Result<Engine> {
        match self.markdown.parser.as_deref() {
            Some(name) => Engine::from_config_name(name),
            None => Ok(Engine::default()),
        }
    }

    /// Base URL with any trailing slash removed; empty string when unset.
    #[must_use]
    pub fn baseurl(&self) -> String {
        self.site
            .baseurl
            .as_deref()
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_default()
    }
}
