//! # bengal-core
//!
//! Content-processing core for the Bengal static site generator: a typed
//! markdown AST with an O(n) parser, an extensible directive system,
//! pure AST transforms, an HTML renderer with pluggable syntax
//! highlighting, and a crash-safe incremental build cache.
//!
//! ## Architecture
//!
//! - **AST**: immutable tagged-union tree plus walking/extraction
//!   utilities and pure link transforms
//! - **Parser**: block + inline phases with the colon-fence directive
//!   extension; fresh state per call, safe to share across threads
//! - **Directives**: a startup-immutable registry of stateless handlers
//!   with contract validation
//! - **Rendering**: single-pass string-builder HTML writer, highlighter
//!   adapter with ordered parallel batching, and a unified HTML
//!   post-transform for the legacy path
//! - **Cache**: JSON (optionally zstd) persistence of fingerprints,
//!   dependency graphs, taxonomy indexes, parsed content, and validation
//!   results, guarded by advisory file locks and atomic renames
//! - **Observability**: phase-aware structured build logger plus
//!   `tracing` for library internals
//!
//! ## Quick Start
//!
//! ```
//! use bengal_core::{create_markdown_parser, Metadata};
//!
//! let parser = create_markdown_parser(None)?;
//! let html = parser.parse("# Hello\n\nSome **markdown**.", &Metadata::default())?;
//! assert!(html.contains("<strong>markdown</strong>"));
//! # Ok::<(), bengal_core::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Content problems never abort a build; they surface as diagnostics and
//! visible error markup. Only configuration errors are fatal, and those
//! are raised at construction time with a suggested fix.

/// Content intelligence analyzer (advisory suggestions)
pub mod analysis;
/// Typed markdown AST, utilities, and pure transforms
pub mod ast;
/// Incremental build cache
pub mod cache;
/// Typed configuration the core consumes
pub mod config;
/// Parse diagnostics
pub mod diagnostics;
/// Directive registry, options, and handlers
pub mod directives;
/// Error types and result alias
pub mod error;
/// Phase-aware structured build logger
pub mod logger;
/// Markdown parser engines
pub mod parser;
/// AST → HTML rendering, highlighting, and HTML post-transforms
pub mod render;
/// File locking and atomic write primitives
pub mod utils;

// Re-export commonly used types
pub use analysis::{analyze_content, ContentAnalysisReport, PageSample};
pub use ast::utils::{
    extract_links, extract_plain_text, extract_toc, generate_heading_id, render_toc_html,
    slugify, walk, TocItem,
};
pub use ast::transforms::{add_baseurl, normalize_md_links, transform_links};
pub use ast::{AstNode, Document, Location, OptionsRecord};
pub use cache::{BuildCache, CheckResult, FileFingerprint, ParsedContentEntry, CACHE_VERSION};
pub use config::{Config, Engine};
pub use diagnostics::{Diagnostic, DiagnosticSeverity};
pub use directives::{known_directive_names, validate_nested_fences, DirectiveRegistry};
pub use error::{Error, Result};
pub use parser::{create_markdown_parser, Metadata, ParseResult, Parser, XrefIndex};
pub use render::highlight::{highlight, highlight_many};
pub use render::transform::{create_transformer, HybridHtmlTransformer};
pub use utils::atomic_write::AtomicFile;
pub use utils::file_lock::{file_lock, is_locked, remove_stale_lock};
