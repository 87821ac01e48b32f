//! Inline-phase parsing.
//!
//! Expands text runs into emphasis, strong, strikethrough, code spans,
//! links, images, footnote references, cross-references, and breaks.
//! Emphasis uses the standard left-/right-flanking delimiter rule with a
//! delimiter stack; there is no regex anywhere on this path, so parse time
//! stays linear in the input.

use crate::ast::{AstNode, Location};
use crate::diagnostics::Diagnostic;

use super::XrefIndex;

/// Intermediate inline item: a finished node, an emphasis delimiter run,
/// or a pending link/image bracket.
enum Item {
    Node(AstNode),
    Delim {
        ch: u8,
        count: usize,
        can_open: bool,
        can_close: bool,
        location: Location,
    },
    OpenBracket {
        image: bool,
        active: bool,
        location: Location,
    },
}

pub(crate) struct InlineParser<'a> {
    text: &'a str,
    xref: Option<&'a XrefIndex>,
    line: usize,
    items: Vec<Item>,
    buf: String,
}

/// Parse the inline content of one block.
///
/// `start_line` is the 1-based line of the block's first source line;
/// newlines inside `text` advance the location for later nodes.
pub(crate) fn parse_inlines(
    text: &str,
    start_line: usize,
    xref: Option<&XrefIndex>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<AstNode> {
    InlineParser {
        text,
        xref,
        line: start_line,
        items: Vec::new(),
        buf: String::new(),
    }
    .run(diagnostics)
}

fn is_punct(c: char) -> bool {
    c.is_ascii_punctuation()
}

impl<'a> InlineParser<'a> {
    fn location(&self) -> Location {
        Location::at(self.line)
    }

    fn flush(&mut self) {
        if !self.buf.is_empty() {
            let raw = std::mem::take(&mut self.buf);
            self.items.push(Item::Node(AstNode::Text {
                location: self.location(),
                raw,
            }));
        }
    }

    fn run(mut self, diagnostics: &mut Vec<Diagnostic>) -> Vec<AstNode> {
        let bytes = self.text.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i = self.scan_escape(i),
                b'`' => i = self.scan_code_span(i),
                b'\n' => i = self.scan_newline(i),
                b'*' | b'_' | b'~' => i = self.scan_delimiter(i),
                b'!' if bytes.get(i + 1) == Some(&b'[') => {
                    self.flush();
                    self.items.push(Item::OpenBracket {
                        image: true,
                        active: true,
                        location: self.location(),
                    });
                    i += 2;
                }
                b'[' => i = self.scan_open_bracket(i, diagnostics),
                b']' => i = self.scan_close_bracket(i),
                _ => {
                    let ch_len = char_len(bytes[i]);
                    self.buf.push_str(&self.text[i..i + ch_len]);
                    i += ch_len;
                }
            }
        }
        self.flush();
        let mut out = Vec::with_capacity(self.items.len());
        resolve_emphasis(self.items, &mut out);
        merge_text(out)
    }

    fn scan_escape(&mut self, i: usize) -> usize {
        match self.text.as_bytes().get(i + 1) {
            Some(b'\n') => {
                self.trim_trailing_spaces();
                self.flush();
                self.items.push(Item::Node(AstNode::HardBreak {
                    location: self.location(),
                }));
                self.line += 1;
                i + 2
            }
            Some(&b) if b.is_ascii_punctuation() => {
                self.buf.push(b as char);
                i + 2
            }
            _ => {
                self.buf.push('\\');
                i + 1
            }
        }
    }

    fn scan_code_span(&mut self, i: usize) -> usize {
        let bytes = self.text.as_bytes();
        let open_len = run_len(bytes, i, b'`');
        let mut j = i + open_len;
        while j < bytes.len() {
            match memchr::memchr(b'`', &bytes[j..]) {
                Some(offset) => {
                    let at = j + offset;
                    let close_len = run_len(bytes, at, b'`');
                    if close_len == open_len {
                        let mut content = self.text[i + open_len..at].replace('\n', " ");
                        if content.len() >= 2
                            && content.starts_with(' ')
                            && content.ends_with(' ')
                            && !content.trim().is_empty()
                        {
                            content = content[1..content.len() - 1].to_string();
                        }
                        self.flush();
                        self.items.push(Item::Node(AstNode::CodeSpan {
                            location: self.location(),
                            raw: content,
                        }));
                        self.line += self.text[i..at].matches('\n').count();
                        return at + close_len;
                    }
                    j = at + close_len;
                }
                None => break,
            }
        }
        // No matching closer: the run is literal backticks.
        self.buf.push_str(&self.text[i..i + open_len]);
        i + open_len
    }

    fn trim_trailing_spaces(&mut self) {
        while self.buf.ends_with(' ') {
            self.buf.pop();
        }
    }

    fn scan_newline(&mut self, i: usize) -> usize {
        let hard = self.buf.ends_with("  ");
        self.trim_trailing_spaces();
        self.flush();
        self.items.push(Item::Node(if hard {
            AstNode::HardBreak {
                location: self.location(),
            }
        } else {
            AstNode::SoftBreak {
                location: self.location(),
            }
        }));
        self.line += 1;
        i + 1
    }

    fn scan_delimiter(&mut self, i: usize) -> usize {
        let bytes = self.text.as_bytes();
        let ch = bytes[i];
        let count = run_len(bytes, i, ch);
        if ch == b'~' && count < 2 {
            self.buf.push('~');
            return i + 1;
        }
        let prev = self.text[..i].chars().next_back();
        let next = self.text[i + count..].chars().next();
        let prev_ws = prev.map_or(true, char::is_whitespace);
        let next_ws = next.map_or(true, char::is_whitespace);
        let prev_punct = prev.is_some_and(is_punct);
        let next_punct = next.is_some_and(is_punct);
        let left = !next_ws && (!next_punct || prev_ws || prev_punct);
        let right = !prev_ws && (!prev_punct || next_ws || next_punct);
        let (can_open, can_close) = if ch == b'_' {
            (left && (!right || prev_punct), right && (!left || next_punct))
        } else {
            (left, right)
        };
        if !can_open && !can_close {
            self.buf
                .push_str(&self.text[i..i + count]);
            return i + count;
        }
        self.flush();
        self.items.push(Item::Delim {
            ch,
            count,
            can_open,
            can_close,
            location: self.location(),
        });
        i + count
    }

    fn scan_open_bracket(&mut self, i: usize, diagnostics: &mut Vec<Diagnostic>) -> usize {
        let text: &'a str = self.text;
        let bytes = text.as_bytes();
        // Cross-reference: [[slug]]
        if bytes.get(i + 1) == Some(&b'[') {
            if let Some(end) = text[i + 2..].find("]]") {
                let key = &text[i + 2..i + 2 + end];
                if !key.contains('[') && !key.contains(']') && !key.contains('\n') && !key.is_empty()
                {
                    return self.emit_xref(key, i, end, diagnostics);
                }
            }
        }
        // Footnote reference: [^id]
        if bytes.get(i + 1) == Some(&b'^') {
            if let Some(end) = text[i + 2..].find(']') {
                let id = &text[i + 2..i + 2 + end];
                if !id.is_empty() && !id.contains(char::is_whitespace) && !id.contains('[') {
                    self.flush();
                    self.items.push(Item::Node(AstNode::FootnoteRef {
                        location: self.location(),
                        identifier: id.to_string(),
                    }));
                    return i + 2 + end + 1;
                }
            }
        }
        self.flush();
        self.items.push(Item::OpenBracket {
            image: false,
            active: true,
            location: self.location(),
        });
        i + 1
    }

    fn emit_xref(
        &mut self,
        key: &str,
        i: usize,
        end: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> usize {
        if let Some(xref) = self.xref {
            match xref.resolve(key) {
                Some(url) => {
                    self.flush();
                    let location = self.location();
                    self.items.push(Item::Node(AstNode::Link {
                        location,
                        url: url.to_string(),
                        title: None,
                        children: vec![AstNode::text(location, key)],
                    }));
                }
                None => {
                    diagnostics.push(Diagnostic::warn(
                        format!("Unresolved cross-reference [[{key}]]"),
                        self.line,
                    ));
                    self.buf.push_str("[[");
                    self.buf.push_str(key);
                    self.buf.push_str("]]");
                }
            }
        } else {
            // Cross-references disabled: leave the literal text alone.
            self.buf.push_str("[[");
            self.buf.push_str(key);
            self.buf.push_str("]]");
        }
        i + 2 + end + 2
    }

    fn scan_close_bracket(&mut self, i: usize) -> usize {
        self.flush();
        let Some(bracket_index) = self.items.iter().rposition(
            |item| matches!(item, Item::OpenBracket { active: true, .. }),
        ) else {
            self.buf.push(']');
            return i + 1;
        };
        let (image, location) = match &self.items[bracket_index] {
            Item::OpenBracket {
                image, location, ..
            } => (*image, *location),
            _ => unreachable!("rposition returned a non-bracket"),
        };
        let Some((url, title, after)) = parse_link_suffix(self.text, i + 1) else {
            // Not a link: the bracket becomes literal text.
            self.items[bracket_index] = Item::Node(AstNode::Text {
                location,
                raw: if image { "![".into() } else { "[".into() },
            });
            self.buf.push(']');
            return i + 1;
        };
        let inner: Vec<Item> = self.items.split_off(bracket_index + 1);
        self.items.pop();
        let mut children = Vec::with_capacity(inner.len());
        resolve_emphasis(inner, &mut children);
        let children = merge_text(children);
        let node = if image {
            let alt = children.iter().map(collect_node_text).collect::<String>();
            AstNode::Image {
                location,
                src: url,
                alt,
                title,
            }
        } else {
            // Links may not contain links: deactivate enclosing brackets.
            for item in &mut self.items {
                if let Item::OpenBracket { image: false, active, .. } = item {
                    *active = false;
                }
            }
            AstNode::Link {
                location,
                url,
                title,
                children,
            }
        };
        self.items.push(Item::Node(node));
        after
    }
}

fn char_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

fn run_len(bytes: &[u8], at: usize, ch: u8) -> usize {
    bytes[at..].iter().take_while(|&&b| b == ch).count()
}

fn collect_node_text(node: &AstNode) -> String {
    crate::ast::utils::extract_text(node)
}

/// Parse `(dest "title")` immediately after a closing bracket.
///
/// Returns the destination, optional title, and the byte offset just past
/// the closing parenthesis.
fn parse_link_suffix(text: &str, at: usize) -> Option<(String, Option<String>, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(at) != Some(&b'(') {
        return None;
    }
    let mut i = at + 1;
    while matches!(bytes.get(i), Some(b' ' | b'\n')) {
        i += 1;
    }
    let mut url = String::new();
    if bytes.get(i) == Some(&b'<') {
        i += 1;
        loop {
            match bytes.get(i)? {
                b'>' => {
                    i += 1;
                    break;
                }
                b'\n' => return None,
                b'\\' if matches!(bytes.get(i + 1), Some(b) if b.is_ascii_punctuation()) => {
                    url.push(bytes[i + 1] as char);
                    i += 2;
                }
                _ => {
                    let len = char_len(bytes[i]);
                    url.push_str(&text[i..i + len]);
                    i += len;
                }
            }
        }
    } else {
        let mut depth = 0usize;
        loop {
            match bytes.get(i) {
                None => break,
                Some(b' ' | b'\n') => break,
                Some(b'(') => {
                    depth += 1;
                    url.push('(');
                    i += 1;
                }
                Some(b')') => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    url.push(')');
                    i += 1;
                }
                Some(b'\\') if matches!(bytes.get(i + 1), Some(b) if b.is_ascii_punctuation()) => {
                    url.push(bytes[i + 1] as char);
                    i += 2;
                }
                Some(&b) => {
                    let len = char_len(b);
                    url.push_str(&text[i..i + len]);
                    i += len;
                }
            }
        }
    }
    while matches!(bytes.get(i), Some(b' ' | b'\n')) {
        i += 1;
    }
    let mut title = None;
    if let Some(&quote) = bytes.get(i) {
        if quote == b'"' || quote == b'\'' {
            let start = i + 1;
            let rel = memchr::memchr(quote, &bytes[start..])?;
            title = Some(text[start..start + rel].to_string());
            i = start + rel + 1;
            while matches!(bytes.get(i), Some(b' ' | b'\n')) {
                i += 1;
            }
        }
    }
    if bytes.get(i) != Some(&b')') {
        return None;
    }
    Some((url, title, i + 1))
}

/// Resolve emphasis delimiters in a finished item sequence.
///
/// Finds the leftmost closer with a matching opener, wraps the middle
/// (recursively resolved) in the corresponding node, and repeats until no
/// pairs remain. Leftover delimiters and brackets degrade to literal text.
fn resolve_emphasis(mut items: Vec<Item>, out: &mut Vec<AstNode>) {
    loop {
        let Some((open_index, close_index)) = find_pair(&items) else {
            break;
        };
        let middle: Vec<Item> = items.drain(open_index + 1..close_index).collect();
        let mut children = Vec::with_capacity(middle.len());
        resolve_emphasis(middle, &mut children);
        let children = merge_text(children);

        let (ch, open_count, location) = match &items[open_index] {
            Item::Delim {
                ch,
                count,
                location,
                ..
            } => (*ch, *count, *location),
            _ => unreachable!("find_pair returned a non-delimiter"),
        };
        let close_count = match &items[open_index + 1] {
            Item::Delim { count, .. } => *count,
            _ => unreachable!("find_pair returned a non-delimiter"),
        };

        let (node, used) = match ch {
            b'~' => (
                AstNode::Strikethrough { location, children },
                2,
            ),
            _ if open_count >= 2 && close_count >= 2 => {
                (AstNode::Strong { location, children }, 2)
            }
            _ => (AstNode::Emphasis { location, children }, 1),
        };

        shrink_delim(&mut items, open_index + 1, used);
        let opener_removed = shrink_delim(&mut items, open_index, used);
        let at = if opener_removed { open_index } else { open_index + 1 };
        items.insert(at, Item::Node(node));
    }
    for item in items {
        out.push(item_to_node(item));
    }
}

/// Subtract `used` from the delimiter at `index`, removing it when spent.
/// Returns whether the delimiter was removed.
fn shrink_delim(items: &mut Vec<Item>, index: usize, used: usize) -> bool {
    let remove = match items.get_mut(index) {
        Some(Item::Delim { count, .. }) => {
            *count = count.saturating_sub(used);
            *count == 0
        }
        _ => false,
    };
    if remove {
        items.remove(index);
    }
    remove
}

/// Leftmost closer that has an opener to its left.
fn find_pair(items: &[Item]) -> Option<(usize, usize)> {
    for (close_index, item) in items.iter().enumerate() {
        let Item::Delim {
            ch,
            can_close: true,
            count,
            ..
        } = item
        else {
            continue;
        };
        if *ch == b'~' && *count < 2 {
            continue;
        }
        let opener = items[..close_index].iter().rposition(|candidate| {
            matches!(
                candidate,
                Item::Delim {
                    ch: open_ch,
                    can_open: true,
                    count: open_count,
                    ..
                } if open_ch == ch && (*ch != b'~' || *open_count >= 2)
            )
        });
        if let Some(open_index) = opener {
            // Only adjacent-with-content pairs make sense.
            if close_index > open_index {
                return Some((open_index, close_index));
            }
        }
    }
    None
}

fn item_to_node(item: Item) -> AstNode {
    match item {
        Item::Node(node) => node,
        Item::Delim {
            ch,
            count,
            location,
            ..
        } => AstNode::Text {
            location,
            raw: (ch as char).to_string().repeat(count),
        },
        Item::OpenBracket {
            image, location, ..
        } => AstNode::Text {
            location,
            raw: if image { "![".into() } else { "[".into() },
        },
    }
}

/// Merge adjacent text nodes produced by delimiter fallback.
fn merge_text(nodes: Vec<AstNode>) -> Vec<AstNode> {
    let mut out: Vec<AstNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let (
            Some(AstNode::Text { raw: prev, .. }),
            AstNode::Text { raw, .. },
        ) = (out.last_mut(), &node)
        {
            prev.push_str(raw);
            continue;
        }
        out.push(node);
    }
    out
}
