//! Error types and handling for bengal-core operations.
//!
//! This module provides a single error type covering all failures in the
//! content-processing core. Errors are categorized for easier handling and
//! include context about recoverability for retry logic.
//!
//! ## Error Categories
//!
//! - **I/O Errors**: File system operations, disk access
//! - **Parse Errors**: Markdown parsing, directive syntax
//! - **Cache Errors**: Build cache storage and consistency
//! - **Lock Errors**: Cross-process advisory lock acquisition
//! - **Configuration Errors**: Invalid settings (the only fatal category)
//! - **Serialization Errors**: JSON encode/decode of persisted state
//!
//! Content problems never abort a build: parse and directive issues surface
//! as diagnostics on the event stream, and cache failures degrade to a
//! cold build. Only configuration errors are fatal, and those are raised at
//! parser construction time with a suggested fix in the message.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for bengal-core operations.
///
/// All public functions in bengal-core return `Result<T, Error>` for
/// consistent error handling. `Display` gives user-facing messages;
/// `Debug` includes the full source chain.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers file system operations like reading/writing files and
    /// creating directories. The underlying `std::io::Error` is preserved.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing operation failed.
    ///
    /// Raised only for failures that prevent producing output at all
    /// (e.g. requesting AST mode from an HTML-only engine). Malformed
    /// markdown and directive syntax produce diagnostics instead.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration is invalid.
    ///
    /// The only fatal category. Messages include the suggested fix, e.g.
    /// the list of valid `markdown.parser` engines.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Build cache storage operation failed.
    ///
    /// Covers cache consistency problems beyond basic file I/O, such as
    /// atomic-rename failures and corrupted payloads that could not be
    /// self-healed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An advisory file lock could not be acquired before the timeout.
    ///
    /// The caller decides whether to retry, skip, or abort. The path is
    /// the file the lock protects, not the sibling `.lock` file.
    #[error("Could not acquire lock on {} within {timeout_secs}s", path.display())]
    LockAcquisition {
        /// File the lock protects.
        path: PathBuf,
        /// Timeout that elapsed.
        timeout_secs: f64,
    },

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Returns the category name for this error.
    ///
    /// Categories are stable strings usable in logs and metrics.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::Cache(_) => "cache",
            Self::LockAcquisition { .. } => "lock",
            Self::Serialize(_) => "serialize",
        }
    }

    /// Whether retrying the operation might succeed.
    ///
    /// Lock timeouts and interrupted I/O are transient; configuration and
    /// parse errors are permanent until the input changes.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::LockAcquisition { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// Result alias used throughout bengal-core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        assert_eq!(Error::Parse("x".into()).category(), "parse");
        assert_eq!(Error::Config("x".into()).category(), "config");
        assert_eq!(Error::Cache("x".into()).category(), "cache");
        let lock = Error::LockAcquisition {
            path: PathBuf::from("/tmp/cache.json"),
            timeout_secs: 10.0,
        };
        assert_eq!(lock.category(), "lock");
    }

    #[test]
    fn test_lock_error_is_recoverable() {
        let lock = Error::LockAcquisition {
            path: PathBuf::from("cache.json"),
            timeout_secs: 1.0,
        };
        assert!(lock.is_recoverable());
        assert!(!Error::Config("bad engine".into()).is_recoverable());
    }

    #[test]
    fn test_lock_error_message_names_path() {
        let lock = Error::LockAcquisition {
            path: PathBuf::from("/site/.bengal/cache.json"),
            timeout_secs: 10.0,
        };
        let msg = lock.to_string();
        assert!(msg.contains("cache.json"));
        assert!(msg.contains("10"));
    }
}
