//! Parse diagnostics.
//!
//! Content problems never abort a build: the parser and directive system
//! report them as diagnostics attached to the parse result, and rendering
//! continues to EOF.

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Informational notice.
    Info,
    /// Suspicious input; output may not be what the author intended.
    Warn,
    /// Invalid input; recovered with a best-effort interpretation.
    Error,
}

/// A single diagnostic produced while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// How serious the issue is.
    pub severity: DiagnosticSeverity,
    /// Human-readable description, including recovery action where relevant.
    pub message: String,
    /// 1-based source line, when attributable.
    pub line: Option<usize>,
}

impl Diagnostic {
    /// An error-severity diagnostic at a line.
    #[must_use]
    pub fn error(message: impl Into<String>, line: usize) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            line: Some(line),
        }
    }

    /// A warning-severity diagnostic at a line.
    #[must_use]
    pub fn warn(message: impl Into<String>, line: usize) -> Self {
        Self {
            severity: DiagnosticSeverity::Warn,
            message: message.into(),
            line: Some(line),
        }
    }
}
