//! Colon-fence tokenizer for the directive extension.
//!
//! A directive opens on `:{N}{type}[ title]` with `N >= 3` and closes on a
//! bare fence `:{M}` with `M >= N`, or on a named closer `:{M}{/type}` with
//! `M >= 3` regardless of depth. Named closers are the recommended form for
//! nesting; fence-depth counting still works.
//!
//! The scanner turns a source document into a segment tree: runs of plain
//! lines interleaved with directive blocks, each block carrying its own
//! nested segments. Fences inside fenced code blocks never count. All
//! violations are reported as diagnostics; the scanner always produces a
//! tree and never aborts.
//!
//! Severity policy: unclosed/orphaned/too-short/skipping closers are
//! errors; same-length unindented nesting is a warning that recommends
//! named closers (the legacy engines accepted it, closing innermost-first).

use crate::ast::OptionsRecord;
use crate::diagnostics::{Diagnostic, DiagnosticSeverity};

/// One source line with its original 1-based number, opener indent removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Body content of a directive (or the document root): plain-line runs
/// interleaved with nested directive blocks, in source order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Lines(Vec<SourceLine>),
    Directive(DirectiveBlock),
}

/// A scanned directive block, options already split off the body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DirectiveBlock {
    pub name: String,
    pub title: Option<String>,
    pub options: OptionsRecord,
    pub line: usize,
    pub body: Vec<Segment>,
}

/// What a single line means to the fence scanner.
enum LineKind<'a> {
    Opener {
        indent: usize,
        fence_len: usize,
        name: &'a str,
        title: Option<&'a str>,
    },
    BareCloser {
        fence_len: usize,
    },
    NamedCloser {
        name: &'a str,
    },
    Content,
}

fn classify(line: &str) -> LineKind<'_> {
    let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
    let rest = &line[indent..];
    let fence_len = rest.bytes().take_while(|&b| b == b':').count();
    if fence_len < 3 {
        return LineKind::Content;
    }
    let after = &rest[fence_len..];
    let trimmed = after.trim_end();
    if trimmed.is_empty() {
        return LineKind::BareCloser { fence_len };
    }
    let Some(braced) = trimmed.strip_prefix('{') else {
        return LineKind::Content;
    };
    let Some(close) = braced.find('}') else {
        return LineKind::Content;
    };
    let name = &braced[..close];
    let title = braced[close + 1..].trim();
    if let Some(closer_name) = name.strip_prefix('/') {
        if !title.is_empty() || !is_directive_name(closer_name) {
            return LineKind::Content;
        }
        return LineKind::NamedCloser { name: closer_name };
    }
    if !is_directive_name(name) {
        return LineKind::Content;
    }
    LineKind::Opener {
        indent,
        fence_len,
        name,
        title: if title.is_empty() { None } else { Some(title) },
    }
}

fn is_directive_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Code-fence open/close detection (backtick or tilde runs of 3+).
pub(crate) fn code_fence(line: &str) -> Option<(u8, usize)> {
    let trimmed = line.trim_start();
    let first = *trimmed.as_bytes().first()?;
    if first != b'`' && first != b'~' {
        return None;
    }
    let run = trimmed.bytes().take_while(|&b| b == first).count();
    if run < 3 {
        return None;
    }
    // Backtick info strings may not themselves contain backticks.
    if first == b'`' && trimmed[run..].contains('`') {
        return None;
    }
    Some((first, run))
}

pub(crate) fn closes_code_fence(line: &str, open: (u8, usize)) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.bytes().all(|b| b == open.0)
        && trimmed.len() >= open.1
}

struct Frame {
    name: String,
    title: Option<String>,
    fence_len: usize,
    indent: usize,
    line: usize,
    segments: Vec<Segment>,
    pending: Vec<SourceLine>,
}

impl Frame {
    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.segments
                .push(Segment::Lines(std::mem::take(&mut self.pending)));
        }
    }
}

/// Scanner state: the document root plus a stack of open directives.
pub(crate) struct FenceScanner {
    root_segments: Vec<Segment>,
    root_pending: Vec<SourceLine>,
    stack: Vec<Frame>,
    diagnostics: Vec<Diagnostic>,
    in_code: Option<(u8, usize)>,
}

impl FenceScanner {
    fn new() -> Self {
        Self {
            root_segments: Vec::new(),
            root_pending: Vec::new(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
            in_code: None,
        }
    }

    fn push_content(&mut self, number: usize, line: &str) {
        let (segments_pending, indent) = match self.stack.last_mut() {
            Some(frame) => (&mut frame.pending, frame.indent),
            None => (&mut self.root_pending, 0),
        };
        let strip = line
            .bytes()
            .take(indent)
            .take_while(|&b| b == b' ' || b == b'\t')
            .count();
        segments_pending.push(SourceLine {
            number,
            text: line[strip..].to_string(),
        });
    }

    fn flush_innermost(&mut self) {
        match self.stack.last_mut() {
            Some(frame) => frame.flush(),
            None => {
                if !self.root_pending.is_empty() {
                    self.root_segments
                        .push(Segment::Lines(std::mem::take(&mut self.root_pending)));
                }
            }
        }
    }

    fn close_frame(&mut self, mut frame: Frame) {
        frame.flush();
        let options = extract_options(&mut frame.segments);
        let block = DirectiveBlock {
            name: frame.name,
            title: frame.title,
            options,
            line: frame.line,
            body: frame.segments,
        };
        match self.stack.last_mut() {
            Some(parent) => parent.segments.push(Segment::Directive(block)),
            None => self.root_segments.push(Segment::Directive(block)),
        }
    }

    /// Close every frame above `keep_index`, reporting them as skipped.
    fn close_inner_frames(&mut self, keep_index: usize, closer_line: usize) {
        if self.stack.len() > keep_index + 1 {
            let skipped: Vec<String> = self.stack[keep_index + 1..]
                .iter()
                .map(|f| format!("'{}' (opened at line {})", f.name, f.line))
                .collect();
            self.diagnostics.push(Diagnostic::error(
                format!(
                    "Closing fence at line {closer_line} leaves inner directives unclosed: {}",
                    skipped.join(", ")
                ),
                closer_line,
            ));
            while self.stack.len() > keep_index + 1 {
                if let Some(frame) = self.stack.pop() {
                    self.close_frame(frame);
                }
            }
        }
    }

    fn scan_line(&mut self, number: usize, line: &str) {
        if let Some(open) = self.in_code {
            if closes_code_fence(line, open) {
                self.in_code = None;
            }
            self.push_content(number, line);
            return;
        }
        if let Some(open) = code_fence(line) {
            self.in_code = Some(open);
            self.push_content(number, line);
            return;
        }

        match classify(line) {
            LineKind::Content => self.push_content(number, line),
            LineKind::Opener {
                indent,
                fence_len,
                name,
                title,
            } => {
                self.flush_innermost();
                self.stack.push(Frame {
                    name: name.to_string(),
                    title: title.map(str::to_string),
                    fence_len,
                    indent,
                    line: number,
                    segments: Vec::new(),
                    pending: Vec::new(),
                });
            }
            LineKind::BareCloser { fence_len } => {
                if self.stack.is_empty() {
                    self.diagnostics.push(Diagnostic::error(
                        format!("Orphaned closing fence at line {number}: no directive is open"),
                        number,
                    ));
                    self.push_content(number, line);
                    return;
                }
                // Prefer the deepest open directive with the exact fence
                // length; fall back to the innermost for longer closers.
                let exact = self
                    .stack
                    .iter()
                    .rposition(|f| f.fence_len == fence_len);
                let target = match exact {
                    Some(i) => i,
                    None => {
                        let innermost = self.stack.len() - 1;
                        if fence_len
                            < self.stack[innermost].fence_len
                        {
                            self.diagnostics.push(Diagnostic::error(
                                format!(
                                    "Closing fence at line {number} is too short: {fence_len} \
                                     colons cannot close '{}' opened with {} at line {}",
                                    self.stack[innermost].name,
                                    self.stack[innermost].fence_len,
                                    self.stack[innermost].line
                                ),
                                number,
                            ));
                            self.push_content(number, line);
                            return;
                        }
                        innermost
                    }
                };
                // A bare closer resolving same-length unindented nesting is
                // ambiguous (named closers are not): flag it.
                if target > 0 {
                    let frame = &self.stack[target];
                    let parent = &self.stack[target - 1];
                    if frame.fence_len == parent.fence_len && frame.indent <= parent.indent {
                        self.diagnostics.push(Diagnostic::warn(
                            format!(
                                "Directive '{}' at line {} uses the same fence length as its \
                                 parent '{}' without indentation; closing it with a bare fence \
                                 is ambiguous. Recommended: use named closers (:::{{/{}}}).",
                                frame.name, frame.line, parent.name, frame.name,
                            ),
                            number,
                        ));
                    }
                }
                self.close_inner_frames(target, number);
                if let Some(frame) = self.stack.pop() {
                    self.close_frame(frame);
                }
            }
            LineKind::NamedCloser { name } => {
                let Some(target) = self.stack.iter().rposition(|f| f.name == name) else {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "Named closer for '{name}' at line {number} has no matching opener"
                        ),
                        number,
                    ));
                    self.push_content(number, line);
                    return;
                };
                self.close_inner_frames(target, number);
                if let Some(frame) = self.stack.pop() {
                    self.close_frame(frame);
                }
            }
        }
    }

    fn finish(mut self, total_lines: usize) -> (Vec<Segment>, Vec<Diagnostic>) {
        while let Some(frame) = self.stack.pop() {
            self.diagnostics.push(Diagnostic::error(
                format!(
                    "Directive '{}' opened at line {} was never closed before end of file",
                    frame.name, frame.line
                ),
                total_lines,
            ));
            self.close_frame(frame);
        }
        if !self.root_pending.is_empty() {
            self.root_segments
                .push(Segment::Lines(std::mem::take(&mut self.root_pending)));
        }
        (self.root_segments, self.diagnostics)
    }
}

/// Scan a document into segments plus fence diagnostics.
pub(crate) fn scan_segments(source: &str) -> (Vec<Segment>, Vec<Diagnostic>) {
    let mut scanner = FenceScanner::new();
    let mut total = 0usize;
    for (i, line) in source.lines().enumerate() {
        total = i + 1;
        scanner.scan_line(i + 1, line);
    }
    scanner.finish(total)
}

/// Split leading `:key: value` option lines off a directive body.
///
/// The option block ends at the first non-option line; a blank line also
/// terminates it (blank lines may not appear within the block).
fn extract_options(segments: &mut [Segment]) -> OptionsRecord {
    let mut options = OptionsRecord::new();
    let Some(Segment::Lines(lines)) = segments.first_mut() else {
        return options;
    };
    let mut consumed = 0;
    for line in lines.iter() {
        let Some((key, value)) = parse_option_line(&line.text) else {
            break;
        };
        options.insert(key.to_string(), value.to_string());
        consumed += 1;
    }
    lines.drain(..consumed);
    options
}

/// Parse a single `:key: value` option line.
pub(crate) fn parse_option_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(':')?;
    let colon = rest.find(':')?;
    let key = &rest[..colon];
    if key.is_empty()
        || !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return None;
    }
    Some((key, rest[colon + 1..].trim()))
}

/// Validate nested directive fences in a document.
///
/// Standalone syntax check used by health validators: returns one message
/// per violation (unclosed fences, orphaned or too-short closers, closers
/// that skip inner directives, and ambiguous same-length nesting). An empty
/// result means the document's fences are well-formed.
#[must_use]
pub fn validate_nested_fences(content: &str) -> Vec<String> {
    let (_, diagnostics) = scan_segments(content);
    diagnostics
        .into_iter()
        .filter(|d| {
            matches!(
                d.severity,
                DiagnosticSeverity::Error | DiagnosticSeverity::Warn
            )
        })
        .map(|d| d.message)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive_names(segments: &[Segment]) -> Vec<&str> {
        segments
            .iter()
            .filter_map(|s| match s {
                Segment::Directive(d) => Some(d.name.as_str()),
                Segment::Lines(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_simple_directive_with_fence_closer() {
        let (segments, diagnostics) = scan_segments(":::{note}\nContent\n:::\n");
        assert!(diagnostics.is_empty());
        assert_eq!(directive_names(&segments), vec!["note"]);
    }

    #[test]
    fn test_named_closers_nest_without_counting() {
        let source = ":::{tab-set}\n:::{tab-item} Python\nHello\n:::{/tab-item}\n:::{tab-item} Rust\nSalut\n:::{/tab-item}\n:::{/tab-set}\n";
        let (segments, diagnostics) = scan_segments(source);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
        assert_eq!(segments.len(), 1);
        let Segment::Directive(tab_set) = &segments[0] else {
            panic!("expected directive");
        };
        assert_eq!(tab_set.name, "tab-set");
        let items: Vec<_> = tab_set
            .body
            .iter()
            .filter_map(|s| match s {
                Segment::Directive(d) => Some(d),
                Segment::Lines(_) => None,
            })
            .collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("Python"));
        assert_eq!(items[1].title.as_deref(), Some("Rust"));
    }

    #[test]
    fn test_variable_fence_lengths_nest() {
        let source = "::::{tab-set}\n:::{tab-item} Tab 1\nContent\n:::\n::::\n";
        let errors = validate_nested_fences(source);
        assert!(errors.is_empty(), "unexpected: {errors:?}");
    }

    #[test]
    fn test_same_length_nesting_is_ambiguous() {
        let source = ":::{tab-set}\n:::{tab-item} Tab 1\nContent\n:::\n:::\n";
        let errors = validate_nested_fences(source);
        assert!(!errors.is_empty());
        assert!(errors[0].contains("same fence length"));
        assert!(errors[0].contains("named closers") || errors[0].contains("Recommended"));
    }

    #[test]
    fn test_indented_child_same_length_is_valid() {
        let source = ":::{tab-set}\n    :::{tab-item} Tab 1\n    Content\n    :::\n:::\n";
        let errors = validate_nested_fences(source);
        assert!(errors.is_empty(), "unexpected: {errors:?}");
    }

    #[test]
    fn test_unclosed_fence_reported() {
        let errors = validate_nested_fences(":::{note}\nUnclosed note\n");
        assert!(!errors.is_empty());
        assert!(errors[0].contains("never closed"));
    }

    #[test]
    fn test_orphaned_closer_reported() {
        let errors = validate_nested_fences(":::\nOrphaned\n");
        assert!(!errors.is_empty());
        assert!(errors[0].contains("Orphaned closing fence"));
    }

    #[test]
    fn test_too_short_closer_reported() {
        let errors = validate_nested_fences("::::{note}\nContent\n:::\n");
        assert!(!errors.is_empty());
        assert!(errors[0].contains("too short"));
    }

    #[test]
    fn test_closer_skipping_inner_reported() {
        let source = "::::{tab-set}\n:::{tab-item}\nContent\n::::\n";
        let errors = validate_nested_fences(source);
        assert!(!errors.is_empty());
        assert!(errors[0].contains("leaves inner directives unclosed"));
        assert!(errors[0].contains("'tab-item'"));
    }

    #[test]
    fn test_siblings_may_reuse_fence_length() {
        let source =
            "::::{tab-set}\n:::{tab-item} 1\nContent\n:::\n\n:::{tab-item} 2\nContent\n:::\n::::\n";
        let errors = validate_nested_fences(source);
        assert!(errors.is_empty(), "unexpected: {errors:?}");
    }

    #[test]
    fn test_fences_inside_code_blocks_ignored() {
        let source = ":::{note}\nExample:\n```markdown\n:::{/note}\n```\nStill in the note!\n:::{/note}\n";
        let (segments, diagnostics) = scan_segments(source);
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
        let Segment::Directive(note) = &segments[0] else {
            panic!("expected directive");
        };
        let Segment::Lines(lines) = &note.body[0] else {
            panic!("expected lines");
        };
        let text: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert!(text.contains(&"Still in the note!"));
        assert!(text.contains(&":::{/note}"));
    }

    #[test]
    fn test_options_split_off_body() {
        let source = ":::{dropdown} Click\n:open: true\n:class: wide\n\nBody text\n:::\n";
        let (segments, _) = scan_segments(source);
        let Segment::Directive(d) = &segments[0] else {
            panic!("expected directive");
        };
        assert_eq!(d.options.get("open").map(String::as_str), Some("true"));
        assert_eq!(d.options.get("class").map(String::as_str), Some("wide"));
        let Segment::Lines(lines) = &d.body[0] else {
            panic!("expected lines");
        };
        assert!(lines.iter().any(|l| l.text == "Body text"));
    }

    #[test]
    fn test_flag_option_with_empty_value() {
        assert_eq!(parse_option_line(":optional:"), Some(("optional", "")));
        assert_eq!(parse_option_line(":duration: 5 min"), Some(("duration", "5 min")));
        assert_eq!(parse_option_line("::::"), None);
        assert_eq!(parse_option_line("plain text"), None);
    }

    #[test]
    fn test_unclosed_inner_produces_single_error() {
        // The innermost directive closes; the outer one hits EOF.
        let source = ":::{note}\n:::{tip}\ncontent\n:::\n";
        let (segments, diagnostics) = scan_segments(source);
        let errors: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'note'"));
        assert!(errors[0].message.contains("never closed"));
        // The tree still contains both directives with the content.
        let Segment::Directive(note) = &segments[0] else {
            panic!("expected note");
        };
        assert_eq!(note.name, "note");
        let Segment::Directive(tip) = &note.body[0] else {
            panic!("expected tip inside note");
        };
        assert_eq!(tip.name, "tip");
    }
}
