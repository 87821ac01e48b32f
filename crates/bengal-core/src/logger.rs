//! Phase-aware structured logging for builds.
//!
//! Build phases nest through scoped guards; every event carries the
//! current phase, its depth, and the union of phase context with
//! call-site context (call-site wins). Events print to the console for
//! humans and append to a per-build log file as one JSON object per line.
//!
//! This is the build-facing observability surface; module-internal
//! diagnostics (cache load failures, lock contention) go through
//! `tracing` as usual.
//!
//! ```
//! use bengal_core::logger::{get_logger, log_context};
//!
//! let logger = get_logger("render");
//! {
//!     let _phase = logger.phase("render", log_context(&[("pages", 100.into())]));
//!     logger.info("rendered_page", log_context(&[("path", "docs/intro.md".into())]));
//! }
//! logger.print_summary();
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Log levels in order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Developer detail.
    Debug,
    /// Normal progress.
    Info,
    /// Suspicious but recoverable.
    Warning,
    /// Something failed; the build continues.
    Error,
    /// The build cannot continue.
    Critical,
}

impl LogLevel {
    const fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    const fn color(self) -> &'static str {
        match self {
            Self::Debug => "\x1b[36m",
            Self::Info => "\x1b[32m",
            Self::Warning => "\x1b[33m",
            Self::Error => "\x1b[31m",
            Self::Critical => "\x1b[35m",
        }
    }
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Structured context attached to events.
pub type LogContext = serde_json::Map<String, serde_json::Value>;

/// Build a [`LogContext`] from key/value pairs.
#[must_use]
pub fn log_context(pairs: &[(&str, serde_json::Value)]) -> LogContext {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// One structured log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// ISO-8601 timestamp.
    pub timestamp: String,
    /// Severity label.
    pub level: String,
    /// Name of the emitting logger.
    pub logger_name: String,
    /// Event type (mirrors the message for machine filtering).
    pub event_type: String,
    /// Human-readable message.
    pub message: String,
    /// Current phase, when inside one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Nesting depth of the phase stack at emit time.
    pub phase_depth: usize,
    /// Phase duration; present only on `phase_complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Merged phase + call-site context.
    pub context: LogContext,
}

impl LogEvent {
    /// Format for human consumption on the console.
    #[must_use]
    pub fn format_console(&self, verbose: bool) -> String {
        let indent = "  ".repeat(self.phase_depth);
        let level = LOG_LEVELS
            .iter()
            .find(|l| l.label() == self.level)
            .copied()
            .unwrap_or(LogLevel::Info);
        let phase_marker = self
            .phase
            .as_ref()
            .map(|p| format!(" {BOLD}[{p}]{RESET}"))
            .unwrap_or_default();
        let timing = self
            .duration_ms
            .map(|d| format!(" {DIM}({d:.1}ms){RESET}"))
            .unwrap_or_default();
        let mut line = format!(
            "{indent}{}\u{25cf}{RESET}{phase_marker} {}{timing}",
            level.color(),
            self.message
        );
        if verbose {
            if !self.context.is_empty() {
                let pairs: Vec<String> = self
                    .context
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                line.push_str(&format!(" {DIM}{}{RESET}", pairs.join(" ")));
            }
            let time = self
                .timestamp
                .split('T')
                .nth(1)
                .and_then(|t| t.split('.').next())
                .unwrap_or("");
            line = format!("{DIM}{time}{RESET} {line}");
        }
        line
    }
}

const LOG_LEVELS: [LogLevel; 5] = [
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warning,
    LogLevel::Error,
    LogLevel::Critical,
];

struct PhaseFrame {
    name: String,
    context: LogContext,
}

thread_local! {
    static PHASE_STACK: RefCell<Vec<PhaseFrame>> = const { RefCell::new(Vec::new()) };
}

struct LoggerSettings {
    level: LogLevel,
    verbose: bool,
}

/// Phase-aware structured logger.
///
/// One instance per logger name; events append through a single writer
/// per logger. The phase stack is thread-local, so worker threads track
/// their own nesting.
pub struct BuildLogger {
    name: String,
    settings: RwLock<LoggerSettings>,
    events: Mutex<Vec<LogEvent>>,
    file: Mutex<Option<File>>,
}

/// Scoped phase; completion is emitted when the guard drops.
pub struct PhaseGuard<'a> {
    logger: &'a BuildLogger,
    name: String,
    started: Instant,
    context: LogContext,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        PHASE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut context = self.context.clone();
        context.insert("phase_name".into(), self.name.clone().into());
        if std::thread::panicking() {
            self.logger
                .emit(LogLevel::Error, "phase_error", context, None);
        } else {
            self.logger
                .emit(LogLevel::Info, "phase_complete", context, Some(duration_ms));
        }
    }
}

impl BuildLogger {
    fn new(name: &str, level: LogLevel, log_file: Option<&PathBuf>, verbose: bool) -> Self {
        let file = log_file.and_then(|path| match File::create(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("could not open log file {}: {e}", path.display());
                None
            }
        });
        Self {
            name: name.to_string(),
            settings: RwLock::new(LoggerSettings { level, verbose }),
            events: Mutex::new(Vec::new()),
            file: Mutex::new(file),
        }
    }

    /// Enter a build phase; the returned guard emits `phase_complete`
    /// (with `duration_ms`) on scope exit, or `phase_error` when the
    /// scope unwinds.
    pub fn phase(&self, name: &str, context: LogContext) -> PhaseGuard<'_> {
        let mut start_context = context.clone();
        start_context.insert("phase_name".into(), name.into());
        PHASE_STACK.with(|stack| {
            stack.borrow_mut().push(PhaseFrame {
                name: name.to_string(),
                context: context.clone(),
            });
        });
        self.emit(LogLevel::Info, "phase_start", start_context, None);
        PhaseGuard {
            logger: self,
            name: name.to_string(),
            started: Instant::now(),
            context,
        }
    }

    fn emit(
        &self,
        level: LogLevel,
        message: &str,
        context: LogContext,
        duration_ms: Option<f64>,
    ) {
        let (min_level, verbose) = {
            let settings = self.settings.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            (settings.level, settings.verbose)
        };
        if level < min_level {
            return;
        }

        let (phase, phase_depth, phase_context) = PHASE_STACK.with(|stack| {
            let stack = stack.borrow();
            match stack.last() {
                Some(frame) => (
                    Some(frame.name.clone()),
                    stack.len(),
                    frame.context.clone(),
                ),
                None => (None, 0, LogContext::new()),
            }
        });

        // Call-site context wins over phase context on key conflicts.
        let mut merged = phase_context;
        for (key, value) in context {
            merged.insert(key, value);
        }

        let event = LogEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.label().to_string(),
            logger_name: self.name.clone(),
            event_type: message.to_string(),
            message: message.to_string(),
            phase,
            phase_depth,
            duration_ms,
            context: merged,
        };

        println!("{}", event.format_console(verbose));
        if let Ok(mut file) = self.file.lock() {
            if let Some(file) = file.as_mut() {
                if let Ok(json) = serde_json::to_string(&event) {
                    let _ = writeln!(file, "{json}");
                    let _ = file.flush();
                }
            }
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Debug-level event.
    pub fn debug(&self, message: &str, context: LogContext) {
        self.emit(LogLevel::Debug, message, context, None);
    }

    /// Info-level event.
    pub fn info(&self, message: &str, context: LogContext) {
        self.emit(LogLevel::Info, message, context, None);
    }

    /// Warning-level event.
    pub fn warning(&self, message: &str, context: LogContext) {
        self.emit(LogLevel::Warning, message, context, None);
    }

    /// Error-level event.
    pub fn error(&self, message: &str, context: LogContext) {
        self.emit(LogLevel::Error, message, context, None);
    }

    /// Critical-level event.
    pub fn critical(&self, message: &str, context: LogContext) {
        self.emit(LogLevel::Critical, message, context, None);
    }

    /// Every event this logger emitted.
    #[must_use]
    pub fn get_events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Phase name → duration in milliseconds, from completion events.
    #[must_use]
    pub fn get_phase_timings(&self) -> BTreeMap<String, f64> {
        let mut timings = BTreeMap::new();
        for event in self.get_events() {
            if event.message == "phase_complete" {
                if let (Some(name), Some(duration)) = (
                    event.context.get("phase_name").and_then(|v| v.as_str()),
                    event.duration_ms,
                ) {
                    timings.insert(name.to_string(), duration);
                }
            }
        }
        timings
    }

    /// Print a duration-sorted phase table.
    pub fn print_summary(&self) {
        print_timing_table(&self.get_phase_timings());
    }

    /// Close the log file handle.
    pub fn close(&self) {
        if let Ok(mut file) = self.file.lock() {
            *file = None;
        }
    }
}

fn print_timing_table(timings: &BTreeMap<String, f64>) {
    if timings.is_empty() {
        return;
    }
    let total: f64 = timings.values().sum();
    let mut rows: Vec<(&String, f64)> = timings.iter().map(|(k, v)| (k, *v)).collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));

    println!("\n{}", "=".repeat(60));
    println!("Build Phase Timings:");
    println!("{}", "=".repeat(60));
    for (phase, duration) in rows {
        let percentage = if total > 0.0 { duration / total * 100.0 } else { 0.0 };
        println!("  {phase:30} {duration:8.1}ms ({percentage:5.1}%)");
    }
    println!("{}", "-".repeat(60));
    println!("  {:30} {total:8.1}ms (100.0%)", "TOTAL");
    println!("{}", "=".repeat(60));
}

struct GlobalLogConfig {
    level: LogLevel,
    log_file: Option<PathBuf>,
    verbose: bool,
}

static LOGGERS: Lazy<Mutex<HashMap<String, Arc<BuildLogger>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static GLOBAL_CONFIG: Lazy<RwLock<GlobalLogConfig>> = Lazy::new(|| {
    RwLock::new(GlobalLogConfig {
        level: LogLevel::Info,
        log_file: None,
        verbose: false,
    })
});

/// Configure global logging settings.
///
/// Existing loggers pick up the level and verbosity; their log files are
/// left alone to avoid reopening handles mid-build.
pub fn configure_logging(level: LogLevel, log_file: Option<PathBuf>, verbose: bool) {
    if let Ok(mut config) = GLOBAL_CONFIG.write() {
        config.level = level;
        config.log_file = log_file;
        config.verbose = verbose;
    }
    if let Ok(loggers) = LOGGERS.lock() {
        for logger in loggers.values() {
            if let Ok(mut settings) = logger.settings.write() {
                settings.level = level;
                settings.verbose = verbose;
            }
        }
    }
}

/// Get or create the logger for a name.
#[must_use]
pub fn get_logger(name: &str) -> Arc<BuildLogger> {
    let mut loggers = LOGGERS
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(logger) = loggers.get(name) {
        return Arc::clone(logger);
    }
    let logger = {
        let config = GLOBAL_CONFIG
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::new(BuildLogger::new(
            name,
            config.level,
            config.log_file.as_ref(),
            config.verbose,
        ))
    };
    loggers.insert(name.to_string(), Arc::clone(&logger));
    logger
}

/// Close every logger's file handle.
pub fn close_all_loggers() {
    if let Ok(loggers) = LOGGERS.lock() {
        for logger in loggers.values() {
            logger.close();
        }
    }
}

/// Print a timing summary merged across all loggers.
pub fn print_all_summaries() {
    let mut merged = BTreeMap::new();
    if let Ok(loggers) = LOGGERS.lock() {
        for logger in loggers.values() {
            merged.extend(logger.get_phase_timings());
        }
    }
    print_timing_table(&merged);
}

/// Drop the logger registry. Test isolation only.
pub fn reset_loggers() {
    if let Ok(mut loggers) = LOGGERS.lock() {
        loggers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_logger(name: &str) -> BuildLogger {
        BuildLogger::new(name, LogLevel::Debug, None, false)
    }

    #[test]
    fn test_events_carry_phase_and_depth() {
        let logger = test_logger("test.phase");
        {
            let _outer = logger.phase("build", log_context(&[("pages", 3.into())]));
            {
                let _inner = logger.phase("render", LogContext::new());
                logger.info("rendered", LogContext::new());
            }
        }
        let events = logger.get_events();
        let rendered = events
            .iter()
            .find(|e| e.message == "rendered")
            .expect("rendered event");
        assert_eq!(rendered.phase.as_deref(), Some("render"));
        assert_eq!(rendered.phase_depth, 2);

        let completes: Vec<_> = events
            .iter()
            .filter(|e| e.message == "phase_complete")
            .collect();
        assert_eq!(completes.len(), 2);
        assert!(completes.iter().all(|e| e.duration_ms.is_some()));
    }

    #[test]
    fn test_call_site_context_wins_on_conflict() {
        let logger = test_logger("test.ctx");
        {
            let _phase = logger.phase("build", log_context(&[("source", "phase".into())]));
            logger.info("event", log_context(&[("source", "call".into())]));
        }
        let events = logger.get_events();
        let event = events.iter().find(|e| e.message == "event").unwrap();
        assert_eq!(event.context.get("source"), Some(&"call".into()));
    }

    #[test]
    fn test_level_filtering() {
        let logger = BuildLogger::new("test.level", LogLevel::Warning, None, false);
        logger.debug("dropped", LogContext::new());
        logger.info("dropped too", LogContext::new());
        logger.warning("kept", LogContext::new());
        logger.error("kept too", LogContext::new());
        assert_eq!(logger.get_events().len(), 2);
    }

    #[test]
    fn test_phase_timings_extracted() {
        let logger = test_logger("test.timing");
        {
            let _phase = logger.phase("discovery", LogContext::new());
        }
        let timings = logger.get_phase_timings();
        assert!(timings.contains_key("discovery"));
        assert!(timings["discovery"] >= 0.0);
    }

    #[test]
    fn test_log_file_is_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");
        let logger = BuildLogger::new("test.file", LogLevel::Debug, Some(&path), false);
        logger.info("first", log_context(&[("n", 1.into())]));
        logger.warning("second", LogContext::new());
        logger.close();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let event: LogEvent = serde_json::from_str(line).expect("valid JSON record");
            assert!(!event.timestamp.is_empty());
            assert_eq!(event.logger_name, "test.file");
        }
    }

    #[test]
    fn test_registry_returns_same_instance() {
        reset_loggers();
        let a = get_logger("registry.same");
        let b = get_logger("registry.same");
        assert!(Arc::ptr_eq(&a, &b));
        reset_loggers();
    }

    #[test]
    fn test_console_format_shape() {
        let event = LogEvent {
            timestamp: "2026-01-01T10:20:30.000Z".into(),
            level: "WARNING".into(),
            logger_name: "x".into(),
            event_type: "warned".into(),
            message: "warned".into(),
            phase: Some("render".into()),
            phase_depth: 1,
            duration_ms: Some(12.34),
            context: log_context(&[("k", "v".into())]),
        };
        let plain = event.format_console(false);
        assert!(plain.contains("[render]"));
        assert!(plain.contains("warned"));
        assert!(plain.contains("(12.3ms)"));
        let verbose = event.format_console(true);
        assert!(verbose.contains("10:20:30"));
        assert!(verbose.contains("k=\"v\""));
    }
}
