//! Typed markdown AST.
//!
//! [`AstNode`] is a tagged union of every markdown construct the parser
//! produces. Trees are immutable after parsing: transforms return fresh
//! trees and never mutate their input (see [`transforms`]).
//!
//! Nodes serialize to JSON with a `type` discriminant so cached ASTs
//! round-trip through the build cache byte-for-byte.

pub mod transforms;
pub mod utils;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw directive options as parsed from `:key: value` lines.
///
/// Typed coercion happens per-handler (see `directives::options`); the AST
/// carries the raw string record so cached trees stay engine-agnostic.
pub type OptionsRecord = BTreeMap<String, String>;

/// A document is a sequence of root-level nodes.
pub type Document = Vec<AstNode>;

/// Source position attached to every node for diagnostics.
///
/// Only the 1-based line is tracked; rendered HTML does not preserve byte
/// offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 1-based source line the construct starts on.
    #[serde(default)]
    pub line: usize,
}

impl Location {
    /// Location at a given 1-based line.
    #[must_use]
    pub const fn at(line: usize) -> Self {
        Self { line }
    }
}

/// Column alignment for a table column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableAlign {
    /// No explicit alignment.
    #[default]
    None,
    /// `:---`
    Left,
    /// `:---:`
    Center,
    /// `---:`
    Right,
}

/// One table cell; `header` cells render as `<th>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Whether this cell belongs to the header row.
    #[serde(default)]
    pub header: bool,
    /// Inline content.
    #[serde(default)]
    pub children: Vec<AstNode>,
}

/// A markdown AST node.
///
/// Invariants:
/// - heading `level` is 1..=6;
/// - `List` children are all `ListItem`;
/// - `RawHtml` content is already escaped/trusted by its producer
///   (directive handlers are the only producer);
/// - a `Directive` whose contract declares a required parent must be a
///   descendant of that parent — violations are diagnostics, never
///   rejections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AstNode {
    /// ATX or setext heading.
    Heading {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Heading level, 1..=6.
        level: u8,
        /// Inline content.
        children: Vec<AstNode>,
    },
    /// Paragraph of inline content.
    Paragraph {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Inline content.
        children: Vec<AstNode>,
    },
    /// Literal text run.
    Text {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Unescaped text.
        raw: String,
    },
    /// Inline code span.
    CodeSpan {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Literal span content.
        raw: String,
    },
    /// Emphasis (`*x*`).
    Emphasis {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Inline content.
        children: Vec<AstNode>,
    },
    /// Strong emphasis (`**x**`).
    Strong {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Inline content.
        children: Vec<AstNode>,
    },
    /// Strikethrough (`~~x~~`), rendered as `<del>`.
    Strikethrough {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Inline content.
        children: Vec<AstNode>,
    },
    /// Hard line break (`<br>`).
    HardBreak {
        /// Source position.
        #[serde(default)]
        location: Location,
    },
    /// Soft line break (newline in source).
    SoftBreak {
        /// Source position.
        #[serde(default)]
        location: Location,
    },
    /// Hyperlink.
    Link {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Destination URL.
        url: String,
        /// Optional title attribute.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Link text.
        children: Vec<AstNode>,
    },
    /// Image.
    Image {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Image source URL.
        src: String,
        /// Alternative text.
        alt: String,
        /// Optional title attribute.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    /// Ordered or unordered list. Children are all `ListItem`.
    List {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// `<ol>` vs `<ul>`.
        ordered: bool,
        /// Tight lists render item content without paragraph wrapping.
        tight: bool,
        /// Start number for ordered lists when not 1.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<u64>,
        /// The items.
        items: Vec<AstNode>,
    },
    /// A single list item. `checked` is present only for task-list items.
    ListItem {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Task-list state: `Some(true)` checked, `Some(false)` unchecked,
        /// `None` for ordinary items.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
        /// Item content (blocks).
        children: Vec<AstNode>,
    },
    /// Fenced or indented code block.
    CodeBlock {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Info string after the opening fence, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<String>,
        /// Literal code, trailing newline included.
        raw: String,
    },
    /// Blockquote.
    Blockquote {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Quoted blocks.
        children: Vec<AstNode>,
    },
    /// Thematic break (`---`).
    ThematicBreak {
        /// Source position.
        #[serde(default)]
        location: Location,
    },
    /// Pipe table; rendered inside a `.table-wrapper` div.
    Table {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Header row first, then body rows.
        rows: Vec<Vec<TableCell>>,
        /// Per-column alignment.
        align: Vec<TableAlign>,
    },
    /// Footnote reference (`[^id]`).
    FootnoteRef {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Footnote identifier.
        identifier: String,
    },
    /// Footnote definition (`[^id]: …`).
    FootnoteDef {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Footnote identifier.
        identifier: String,
        /// Definition content.
        children: Vec<AstNode>,
    },
    /// Raw HTML emitted verbatim by the renderer.
    ///
    /// Escape hatch used exclusively by directive handlers; content is
    /// trusted by construction.
    RawHtml {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Final HTML.
        content: String,
    },
    /// A parsed directive block (`:::{name} title` … `:::`).
    Directive {
        /// Source position.
        #[serde(default)]
        location: Location,
        /// Directive name as written (e.g. `note`, `tab-set`).
        name: String,
        /// Title text after the name on the opener line.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Raw `:key: value` options.
        #[serde(default)]
        options: OptionsRecord,
        /// Parsed body content.
        children: Vec<AstNode>,
    },
}

impl AstNode {
    /// Stable snake_case name of this node's variant (the serde tag).
    #[must_use]
    pub const fn node_type(&self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading",
            Self::Paragraph { .. } => "paragraph",
            Self::Text { .. } => "text",
            Self::CodeSpan { .. } => "code_span",
            Self::Emphasis { .. } => "emphasis",
            Self::Strong { .. } => "strong",
            Self::Strikethrough { .. } => "strikethrough",
            Self::HardBreak { .. } => "hard_break",
            Self::SoftBreak { .. } => "soft_break",
            Self::Link { .. } => "link",
            Self::Image { .. } => "image",
            Self::List { .. } => "list",
            Self::ListItem { .. } => "list_item",
            Self::CodeBlock { .. } => "code_block",
            Self::Blockquote { .. } => "blockquote",
            Self::ThematicBreak { .. } => "thematic_break",
            Self::Table { .. } => "table",
            Self::FootnoteRef { .. } => "footnote_ref",
            Self::FootnoteDef { .. } => "footnote_def",
            Self::RawHtml { .. } => "raw_html",
            Self::Directive { .. } => "directive",
        }
    }

    /// Child nodes, if this variant has any.
    ///
    /// `List` exposes its items and `Table` has no direct children (cells
    /// are traversed by [`utils::walk`]).
    #[must_use]
    pub fn children(&self) -> Option<&[AstNode]> {
        match self {
            Self::Heading { children, .. }
            | Self::Paragraph { children, .. }
            | Self::Emphasis { children, .. }
            | Self::Strong { children, .. }
            | Self::Strikethrough { children, .. }
            | Self::Link { children, .. }
            | Self::ListItem { children, .. }
            | Self::Blockquote { children, .. }
            | Self::FootnoteDef { children, .. }
            | Self::Directive { children, .. } => Some(children),
            Self::List { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Source location of this node.
    #[must_use]
    pub const fn location(&self) -> Location {
        match self {
            Self::Heading { location, .. }
            | Self::Paragraph { location, .. }
            | Self::Text { location, .. }
            | Self::CodeSpan { location, .. }
            | Self::Emphasis { location, .. }
            | Self::Strong { location, .. }
            | Self::Strikethrough { location, .. }
            | Self::HardBreak { location }
            | Self::SoftBreak { location }
            | Self::Link { location, .. }
            | Self::Image { location, .. }
            | Self::List { location, .. }
            | Self::ListItem { location, .. }
            | Self::CodeBlock { location, .. }
            | Self::Blockquote { location, .. }
            | Self::ThematicBreak { location }
            | Self::Table { location, .. }
            | Self::FootnoteRef { location, .. }
            | Self::FootnoteDef { location, .. }
            | Self::RawHtml { location, .. }
            | Self::Directive { location, .. } => *location,
        }
    }

    /// Convenience: a text node.
    #[must_use]
    pub fn text(location: Location, raw: impl Into<String>) -> Self {
        Self::Text {
            location,
            raw: raw.into(),
        }
    }

    /// Convenience: a raw-HTML node (directive handler output).
    #[must_use]
    pub fn raw_html(location: Location, content: impl Into<String>) -> Self {
        Self::RawHtml {
            location,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_heading() -> AstNode {
        AstNode::Heading {
            location: Location::at(1),
            level: 2,
            children: vec![AstNode::text(Location::at(1), "Getting Started")],
        }
    }

    #[test]
    fn test_node_type_matches_serde_tag() {
        let json = serde_json::to_value(sample_heading()).unwrap();
        assert_eq!(json["type"], "heading");
        assert_eq!(json["level"], 2);
    }

    #[test]
    fn test_roundtrip_through_json() {
        let node = AstNode::Directive {
            location: Location::at(3),
            name: "note".into(),
            title: Some("Heads up".into()),
            options: OptionsRecord::from([("class".into(), "wide".into())]),
            children: vec![AstNode::text(Location::at(4), "body")],
        };
        let json = serde_json::to_string(&node).unwrap();
        let back: AstNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }

    #[test]
    fn test_missing_location_defaults() {
        let back: AstNode =
            serde_json::from_str(r#"{"type": "text", "raw": "hi"}"#).unwrap();
        assert_eq!(back.location().line, 0);
    }

    #[test]
    fn test_list_children_are_items() {
        let list = AstNode::List {
            location: Location::default(),
            ordered: false,
            tight: true,
            start: None,
            items: vec![AstNode::ListItem {
                location: Location::default(),
                checked: Some(true),
                children: vec![],
            }],
        };
        let children = list.children().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].node_type(), "list_item");
    }
}
