//! Block-phase parsing.
//!
//! A single forward pass over source lines: fenced code, headings,
//! thematic breaks, blockquotes, pipe tables, lists (with task items and
//! tight/loose detection), footnote definitions, and paragraphs. Directive
//! blocks arrive pre-scanned as segments (see `directives::fence`), so this
//! module never sees a colon fence.

use crate::ast::{AstNode, Location, TableAlign, TableCell};
use crate::diagnostics::Diagnostic;
use crate::directives::fence::{closes_code_fence, code_fence, Segment, SourceLine};

use super::inline::parse_inlines;
use super::XrefIndex;

pub(crate) struct BlockContext<'a> {
    pub xref: Option<&'a XrefIndex>,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

/// Parse a scanned segment tree into AST nodes.
pub(crate) fn parse_segments(segments: &[Segment], ctx: &mut BlockContext<'_>) -> Vec<AstNode> {
    let mut nodes = Vec::new();
    for segment in segments {
        match segment {
            Segment::Lines(lines) => nodes.extend(parse_lines(lines, ctx)),
            Segment::Directive(block) => {
                let children = parse_segments(&block.body, ctx);
                nodes.push(AstNode::Directive {
                    location: Location::at(block.line),
                    name: block.name.clone(),
                    title: block.title.clone(),
                    options: block.options.clone(),
                    children,
                });
            }
        }
    }
    nodes
}

/// Parse a run of plain source lines into block nodes.
pub(crate) fn parse_lines(lines: &[SourceLine], ctx: &mut BlockContext<'_>) -> Vec<AstNode> {
    let mut nodes = Vec::new();
    let mut i = 0usize;
    while i < lines.len() {
        let line = &lines[i];
        if line.text.trim().is_empty() {
            i += 1;
            continue;
        }
        if let Some(open) = code_fence(&line.text) {
            i = parse_code_block(lines, i, open, &mut nodes);
            continue;
        }
        if let Some((level, text)) = atx_heading(&line.text) {
            nodes.push(AstNode::Heading {
                location: Location::at(line.number),
                level,
                children: parse_inlines(text, line.number, ctx.xref, ctx.diagnostics),
            });
            i += 1;
            continue;
        }
        if let Some(node) = try_footnote_def(lines, &mut i, ctx) {
            nodes.push(node);
            continue;
        }
        if is_blockquote_line(&line.text) {
            i = parse_blockquote(lines, i, &mut nodes, ctx);
            continue;
        }
        if list_marker(&line.text).is_some() && !is_thematic_break(&line.text) {
            i = parse_list(lines, i, &mut nodes, ctx);
            continue;
        }
        if is_thematic_break(&line.text) {
            nodes.push(AstNode::ThematicBreak {
                location: Location::at(line.number),
            });
            i += 1;
            continue;
        }
        if i + 1 < lines.len() {
            if let Some(align) = delimiter_row(&lines[i + 1].text) {
                if line.text.contains('|') {
                    i = parse_table(lines, i, align, &mut nodes, ctx);
                    continue;
                }
            }
        }
        i = parse_paragraph(lines, i, &mut nodes, ctx);
    }
    nodes
}

fn indent_of(text: &str) -> usize {
    text.len() - text.trim_start_matches(' ').len()
}

fn parse_code_block(
    lines: &[SourceLine],
    start: usize,
    open: (u8, usize),
    nodes: &mut Vec<AstNode>,
) -> usize {
    let opener = &lines[start];
    let indent = indent_of(&opener.text);
    let info = opener.text.trim_start()[open.1..].trim();
    let info = if info.is_empty() {
        None
    } else {
        Some(info.to_string())
    };
    let mut raw = String::new();
    let mut i = start + 1;
    while i < lines.len() {
        if closes_code_fence(&lines[i].text, open) {
            i += 1;
            break;
        }
        let text = &lines[i].text;
        let strip = text
            .bytes()
            .take(indent)
            .take_while(|&b| b == b' ')
            .count();
        raw.push_str(&text[strip..]);
        raw.push('\n');
        i += 1;
    }
    nodes.push(AstNode::CodeBlock {
        location: Location::at(opener.number),
        info,
        raw,
    });
    i
}

fn atx_heading(text: &str) -> Option<(u8, &str)> {
    let trimmed = text.trim_start();
    if indent_of(text) > 3 {
        return None;
    }
    let level = trimmed.bytes().take_while(|&b| b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    let content = rest.trim().trim_end_matches('#').trim_end();
    Some((level as u8, content))
}

fn is_thematic_break(text: &str) -> bool {
    let trimmed = text.trim();
    let Some(first) = trimmed.chars().next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 0usize;
    for c in trimmed.chars() {
        if c == first {
            count += 1;
        } else if c != ' ' {
            return false;
        }
    }
    count >= 3
}

fn is_blockquote_line(text: &str) -> bool {
    indent_of(text) <= 3 && text.trim_start().starts_with('>')
}

fn parse_blockquote(
    lines: &[SourceLine],
    start: usize,
    nodes: &mut Vec<AstNode>,
    ctx: &mut BlockContext<'_>,
) -> usize {
    let mut inner = Vec::new();
    let mut i = start;
    while i < lines.len() && is_blockquote_line(&lines[i].text) {
        let stripped = lines[i].text.trim_start();
        let content = stripped
            .strip_prefix("> ")
            .or_else(|| stripped.strip_prefix('>'))
            .unwrap_or(stripped);
        inner.push(SourceLine {
            number: lines[i].number,
            text: content.to_string(),
        });
        i += 1;
    }
    nodes.push(AstNode::Blockquote {
        location: Location::at(lines[start].number),
        children: parse_lines(&inner, ctx),
    });
    i
}

struct ListMarker {
    ordered: bool,
    start: u64,
    /// Byte offset of the item's content on the marker line.
    content_offset: usize,
}

fn list_marker(text: &str) -> Option<ListMarker> {
    let indent = indent_of(text);
    if indent > 3 {
        return None;
    }
    let rest = &text[indent..];
    let bytes = rest.as_bytes();
    if matches!(bytes.first(), Some(b'-' | b'*' | b'+')) {
        let after = &rest[1..];
        if after.is_empty() || after.starts_with(' ') {
            let spaces = after.bytes().take_while(|&b| b == b' ').count().max(1);
            return Some(ListMarker {
                ordered: false,
                start: 0,
                content_offset: indent + 1 + spaces.min(4),
            });
        }
        return None;
    }
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    if !matches!(bytes.get(digits), Some(b'.' | b')')) {
        return None;
    }
    let after = &rest[digits + 1..];
    if !after.is_empty() && !after.starts_with(' ') {
        return None;
    }
    let spaces = after.bytes().take_while(|&b| b == b' ').count().max(1);
    let start = rest[..digits].parse().unwrap_or(1);
    Some(ListMarker {
        ordered: true,
        start,
        content_offset: indent + digits + 1 + spaces.min(4),
    })
}

fn parse_list(
    lines: &[SourceLine],
    start: usize,
    nodes: &mut Vec<AstNode>,
    ctx: &mut BlockContext<'_>,
) -> usize {
    let first = list_marker(&lines[start].text).unwrap_or(ListMarker {
        ordered: false,
        start: 0,
        content_offset: 2,
    });
    let ordered = first.ordered;
    let list_start = if ordered { Some(first.start) } else { None };
    let mut items: Vec<AstNode> = Vec::new();
    let mut tight = true;
    let mut i = start;
    let mut blank_pending = false;

    while i < lines.len() {
        let line = &lines[i];
        let marker = match list_marker(&line.text) {
            Some(m) if m.ordered == ordered && !is_thematic_break(&line.text) => m,
            _ => break,
        };
        if blank_pending && !items.is_empty() {
            tight = false;
        }
        blank_pending = false;

        // Collect this item's lines: the marker line's content plus any
        // continuation lines indented to the content column.
        let content_start = marker.content_offset.min(line.text.len());
        let mut item_lines = vec![SourceLine {
            number: line.number,
            text: line.text[content_start..].to_string(),
        }];
        i += 1;
        let mut item_blank = false;
        while i < lines.len() {
            let cont = &lines[i];
            if cont.text.trim().is_empty() {
                item_blank = true;
                item_lines.push(SourceLine {
                    number: cont.number,
                    text: String::new(),
                });
                i += 1;
                continue;
            }
            let cont_indent = indent_of(&cont.text);
            if cont_indent >= marker.content_offset {
                if item_blank {
                    tight = false;
                    item_blank = false;
                }
                item_lines.push(SourceLine {
                    number: cont.number,
                    text: cont.text[marker.content_offset..].to_string(),
                });
                i += 1;
                continue;
            }
            if item_blank {
                // Blank line followed by a dedented line: list (or item) ends.
                break;
            }
            if list_marker(&cont.text).is_some() || !is_paragraph_continuation(&cont.text) {
                break;
            }
            // Lazy paragraph continuation.
            item_lines.push(SourceLine {
                number: cont.number,
                text: cont.text.trim_start().to_string(),
            });
            i += 1;
        }
        blank_pending = item_blank;

        while item_lines.last().is_some_and(|l| l.text.trim().is_empty()) {
            item_lines.pop();
        }

        // Task-list marker on the first content line.
        let mut checked = None;
        if let Some(first_line) = item_lines.first_mut() {
            let text = first_line.text.clone();
            if let Some(rest) = text.strip_prefix("[ ] ") {
                checked = Some(false);
                first_line.text = rest.to_string();
            } else if let Some(rest) = text
                .strip_prefix("[x] ")
                .or_else(|| text.strip_prefix("[X] "))
            {
                checked = Some(true);
                first_line.text = rest.to_string();
            }
        }

        items.push(AstNode::ListItem {
            location: Location::at(line.number),
            checked,
            children: parse_lines(&item_lines, ctx),
        });
    }

    nodes.push(AstNode::List {
        location: Location::at(lines[start].number),
        ordered,
        tight,
        start: list_start,
        items,
    });
    i
}

/// Whether a dedented line can lazily continue a list item's paragraph.
fn is_paragraph_continuation(text: &str) -> bool {
    atx_heading(text).is_none()
        && code_fence(text).is_none()
        && !is_thematic_break(text)
        && !is_blockquote_line(text)
}

fn split_row(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in trimmed.chars() {
        if escaped {
            if c != '|' {
                current.push('\\');
            }
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '|' {
            cells.push(current.trim().to_string());
            current = String::new();
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    cells.push(current.trim().to_string());
    cells
}

fn delimiter_row(text: &str) -> Option<Vec<TableAlign>> {
    if !text.contains('-') || !text.contains('|') {
        return None;
    }
    let cells = split_row(text);
    let mut align = Vec::with_capacity(cells.len());
    for cell in &cells {
        let c = cell.trim();
        let left = c.starts_with(':');
        let right = c.ends_with(':');
        let dashes = c.trim_start_matches(':').trim_end_matches(':');
        if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
            return None;
        }
        align.push(match (left, right) {
            (true, true) => TableAlign::Center,
            (true, false) => TableAlign::Left,
            (false, true) => TableAlign::Right,
            (false, false) => TableAlign::None,
        });
    }
    Some(align)
}

fn parse_table(
    lines: &[SourceLine],
    start: usize,
    align: Vec<TableAlign>,
    nodes: &mut Vec<AstNode>,
    ctx: &mut BlockContext<'_>,
) -> usize {
    let columns = align.len();
    let mut rows: Vec<Vec<TableCell>> = Vec::new();
    let header = split_row(&lines[start].text);
    rows.push(make_row(&header, columns, true, lines[start].number, ctx));

    let mut i = start + 2;
    while i < lines.len() {
        let line = &lines[i];
        if line.text.trim().is_empty() || !line.text.contains('|') {
            break;
        }
        let cells = split_row(&line.text);
        rows.push(make_row(&cells, columns, false, line.number, ctx));
        i += 1;
    }

    nodes.push(AstNode::Table {
        location: Location::at(lines[start].number),
        rows,
        align,
    });
    i
}

fn make_row(
    cells: &[String],
    columns: usize,
    header: bool,
    line: usize,
    ctx: &mut BlockContext<'_>,
) -> Vec<TableCell> {
    (0..columns)
        .map(|c| TableCell {
            header,
            children: cells
                .get(c)
                .map(|text| parse_inlines(text, line, ctx.xref, ctx.diagnostics))
                .unwrap_or_default(),
        })
        .collect()
}

fn try_footnote_def(
    lines: &[SourceLine],
    i: &mut usize,
    ctx: &mut BlockContext<'_>,
) -> Option<AstNode> {
    let line = &lines[*i];
    let rest = line.text.strip_prefix("[^")?;
    let close = rest.find("]:")?;
    let identifier = &rest[..close];
    if identifier.is_empty() || identifier.contains(char::is_whitespace) {
        return None;
    }
    let mut inner = vec![SourceLine {
        number: line.number,
        text: rest[close + 2..].trim_start().to_string(),
    }];
    let mut j = *i + 1;
    while j < lines.len() {
        let cont = &lines[j];
        if cont.text.trim().is_empty() {
            break;
        }
        if indent_of(&cont.text) >= 4 {
            inner.push(SourceLine {
                number: cont.number,
                text: cont.text[4..].to_string(),
            });
            j += 1;
            continue;
        }
        break;
    }
    let node = AstNode::FootnoteDef {
        location: Location::at(line.number),
        identifier: identifier.to_string(),
        children: parse_lines(&inner, ctx),
    };
    *i = j;
    Some(node)
}

/// Setext underline check: a run of `=` (h1) or `-` (h2).
fn setext_level(text: &str) -> Option<u8> {
    let trimmed = text.trim();
    if trimmed.is_empty() || indent_of(text) > 3 {
        return None;
    }
    if trimmed.bytes().all(|b| b == b'=') {
        return Some(1);
    }
    if trimmed.bytes().all(|b| b == b'-') {
        return Some(2);
    }
    None
}

fn parse_paragraph(
    lines: &[SourceLine],
    start: usize,
    nodes: &mut Vec<AstNode>,
    ctx: &mut BlockContext<'_>,
) -> usize {
    let mut text = String::new();
    let mut i = start;
    while i < lines.len() {
        let line = &lines[i];
        if line.text.trim().is_empty() {
            break;
        }
        if i > start {
            // A paragraph is interrupted by any other block opener.
            if let Some(level) = setext_level(&line.text) {
                nodes.push(AstNode::Heading {
                    location: Location::at(lines[start].number),
                    level,
                    children: parse_inlines(
                        text.trim_end(),
                        lines[start].number,
                        ctx.xref,
                        ctx.diagnostics,
                    ),
                });
                return i + 1;
            }
            if atx_heading(&line.text).is_some()
                || code_fence(&line.text).is_some()
                || is_thematic_break(&line.text)
                || is_blockquote_line(&line.text)
                || list_marker(&line.text).is_some()
                || line.text.starts_with("[^")
            {
                break;
            }
            if line.text.contains('|')
                && lines.get(i + 1).map_or(false, |next| delimiter_row(&next.text).is_some())
            {
                break;
            }
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(line.text.trim_end());
        i += 1;
    }
    nodes.push(AstNode::Paragraph {
        location: Location::at(lines[start].number),
        children: parse_inlines(&text, lines[start].number, ctx.xref, ctx.diagnostics),
    });
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<AstNode> {
        let mut diagnostics = Vec::new();
        let lines: Vec<SourceLine> = source
            .lines()
            .enumerate()
            .map(|(n, text)| SourceLine {
                number: n + 1,
                text: text.to_string(),
            })
            .collect();
        let mut ctx = BlockContext {
            xref: None,
            diagnostics: &mut diagnostics,
        };
        parse_lines(&lines, &mut ctx)
    }

    #[test]
    fn test_heading_and_paragraph() {
        let nodes = parse("# Title\n\nBody text.\n");
        assert!(matches!(nodes[0], AstNode::Heading { level: 1, .. }));
        assert!(matches!(nodes[1], AstNode::Paragraph { .. }));
    }

    #[test]
    fn test_heading_levels_and_trailing_hashes() {
        let nodes = parse("### Three ###\n");
        match &nodes[0] {
            AstNode::Heading { level, children, .. } => {
                assert_eq!(*level, 3);
                assert!(matches!(&children[0], AstNode::Text { raw, .. } if raw == "Three"));
            }
            other => panic!("expected heading, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_setext_heading() {
        let nodes = parse("Title\n=====\n\nSub\n---\n");
        assert!(matches!(nodes[0], AstNode::Heading { level: 1, .. }));
        assert!(matches!(nodes[1], AstNode::Heading { level: 2, .. }));
    }

    #[test]
    fn test_fenced_code_block_with_info() {
        let nodes = parse("```rust\nfn main() {}\n```\n");
        match &nodes[0] {
            AstNode::CodeBlock { info, raw, .. } => {
                assert_eq!(info.as_deref(), Some("rust"));
                assert_eq!(raw, "fn main() {}\n");
            }
            other => panic!("expected code block, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_tilde_fence_with_longer_closer() {
        let nodes = parse("~~~\ncode\n~~~~~\n");
        assert!(matches!(&nodes[0], AstNode::CodeBlock { raw, .. } if raw == "code\n"));
    }

    #[test]
    fn test_list_markers_inside_code_stay_literal() {
        let nodes = parse("```\n- not a list\n```\n");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], AstNode::CodeBlock { raw, .. } if raw.contains("- not a list")));
    }

    #[test]
    fn test_tight_list() {
        let nodes = parse("- one\n- two\n- three\n");
        match &nodes[0] {
            AstNode::List { ordered, tight, items, .. } => {
                assert!(!ordered);
                assert!(*tight);
                assert_eq!(items.len(), 3);
            }
            other => panic!("expected list, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_blank_line_between_items_makes_loose() {
        let nodes = parse("- one\n\n- two\n");
        assert!(matches!(&nodes[0], AstNode::List { tight: false, items, .. } if items.len() == 2));
    }

    #[test]
    fn test_blank_line_inside_item_makes_loose() {
        let nodes = parse("- one\n\n  more of one\n- two\n");
        match &nodes[0] {
            AstNode::List { tight, items, .. } => {
                assert!(!tight);
                assert_eq!(items.len(), 2);
                // First item has two paragraphs.
                assert_eq!(items[0].children().map(<[AstNode]>::len), Some(2));
            }
            other => panic!("expected list, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_ordered_list_with_start() {
        let nodes = parse("3. three\n4. four\n");
        assert!(matches!(
            &nodes[0],
            AstNode::List { ordered: true, start: Some(3), .. }
        ));
    }

    #[test]
    fn test_task_list_items() {
        let nodes = parse("- [x] done\n- [ ] todo\n");
        match &nodes[0] {
            AstNode::List { items, .. } => {
                assert!(matches!(items[0], AstNode::ListItem { checked: Some(true), .. }));
                assert!(matches!(items[1], AstNode::ListItem { checked: Some(false), .. }));
            }
            other => panic!("expected list, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_nested_list() {
        let nodes = parse("- outer\n  - inner\n");
        match &nodes[0] {
            AstNode::List { items, .. } => {
                assert_eq!(items.len(), 1);
                let children = items[0].children().unwrap();
                assert!(children.iter().any(|n| matches!(n, AstNode::List { .. })));
            }
            other => panic!("expected list, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_blockquote() {
        let nodes = parse("> quoted\n> more\n");
        match &nodes[0] {
            AstNode::Blockquote { children, .. } => {
                assert!(matches!(children[0], AstNode::Paragraph { .. }));
            }
            other => panic!("expected blockquote, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_thematic_break() {
        let nodes = parse("above\n\n---\n\nbelow\n");
        assert!(matches!(nodes[1], AstNode::ThematicBreak { .. }));
    }

    #[test]
    fn test_pipe_table_with_alignment() {
        let nodes = parse("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        match &nodes[0] {
            AstNode::Table { rows, align, .. } => {
                assert_eq!(rows.len(), 2);
                assert!(rows[0][0].header);
                assert!(!rows[1][0].header);
                assert_eq!(align, &vec![TableAlign::Left, TableAlign::Right]);
            }
            other => panic!("expected table, got {}", other.node_type()),
        }
    }

    #[test]
    fn test_footnote_definition() {
        let nodes = parse("[^1]: the note\n");
        assert!(matches!(
            &nodes[0],
            AstNode::FootnoteDef { identifier, .. } if identifier == "1"
        ));
    }

    #[test]
    fn test_paragraph_joins_lines_with_soft_breaks() {
        let nodes = parse("one\ntwo\n");
        match &nodes[0] {
            AstNode::Paragraph { children, .. } => {
                assert!(children.iter().any(|n| matches!(n, AstNode::SoftBreak { .. })));
            }
            other => panic!("expected paragraph, got {}", other.node_type()),
        }
    }
}
