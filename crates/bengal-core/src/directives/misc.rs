//! Small utility directives: badges, buttons, icons, file inclusion,
//! navigation placeholders, version notes, and anchors.

use std::cell::Cell;
use std::path::{Component, Path};

use crate::ast::AstNode;
use crate::ast::utils::slugify;

use super::{DirectiveHandler, DirectiveInvocation, FieldSpec, OptionsSpec};

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn escape_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

const VALID_COLORS: &[&str] = &[
    "primary", "secondary", "success", "danger", "warning", "info", "light", "dark",
];
const VALID_STYLES: &[&str] = &["default", "pill", "outline"];
const VALID_SIZES: &[&str] = &["small", "medium", "large"];

/// `badge`: inline colored label.
pub struct BadgeDirective;

static BADGE_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "badge",
    fields: &[FieldSpec::choice("color", VALID_COLORS)],
};

impl DirectiveHandler for BadgeDirective {
    fn names(&self) -> &'static [&'static str] {
        &["badge"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = BADGE_OPTIONS.parse(inv.options);
        let color = opts.str_or("color", "primary");
        let text = inv.title.unwrap_or("");
        vec![inv.html(format!(
            "<span class=\"badge badge-{color}\">{}</span>",
            escape(text)
        ))]
    }
}

/// `button`: styled link button for CTAs and navigation.
pub struct ButtonDirective;

static BUTTON_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "button",
    fields: &[
        FieldSpec::choice("color", VALID_COLORS),
        FieldSpec::choice("style", VALID_STYLES),
        FieldSpec::choice("size", VALID_SIZES),
        FieldSpec::str("icon"),
        FieldSpec::str("target"),
    ],
};

impl DirectiveHandler for ButtonDirective {
    fn names(&self) -> &'static [&'static str] {
        &["button"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = BUTTON_OPTIONS.parse(inv.options);
        let url = inv.title.unwrap_or("#").trim();
        let label: String = inv
            .children
            .iter()
            .map(crate::ast::utils::extract_text)
            .collect::<String>()
            .trim()
            .to_string();
        let label = if label.is_empty() { "Button".to_string() } else { label };
        let color = opts.str_or("color", "primary");
        let size = opts.str_or("size", "medium");
        let mut classes = format!("button button-{color} button-{size}");
        let style = opts.str_or("style", "default");
        if style != "default" {
            classes.push_str(&format!(" button-{style}"));
        }
        let target = if opts.str_or("target", "") == "_blank" {
            " target=\"_blank\" rel=\"noopener noreferrer\""
        } else {
            ""
        };
        let icon = opts
            .str_opt("icon")
            .map(|i| {
                format!(
                    "<span class=\"button-icon icon-{}\" aria-hidden=\"true\"></span>",
                    escape_attr(i)
                )
            })
            .unwrap_or_default();
        vec![inv.html(format!(
            "<a class=\"{classes}\" href=\"{}\"{target}>{icon}<span class=\"button-text\">{}</span></a>\n",
            escape_attr(url),
            escape(&label)
        ))]
    }
}

/// `icon`: standalone decorative icon.
pub struct IconDirective;

impl DirectiveHandler for IconDirective {
    fn names(&self) -> &'static [&'static str] {
        &["icon"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let name = slugify(inv.title.unwrap_or(""));
        vec![inv.html(format!(
            "<span class=\"icon icon-{name}\" aria-hidden=\"true\"></span>"
        ))]
    }
}

thread_local! {
    /// Guards against include cycles; includes expand during rendering, so
    /// a self-including file would otherwise recurse forever.
    static INCLUDE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

const MAX_INCLUDE_DEPTH: usize = 8;

fn resolve_included(root: &Path, relative: &str) -> Option<std::path::PathBuf> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return None;
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(root.join(candidate))
}

/// `include`: splice another markdown file into the page.
pub struct IncludeDirective;

impl DirectiveHandler for IncludeDirective {
    fn names(&self) -> &'static [&'static str] {
        &["include"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let relative = inv.title.unwrap_or("").trim();
        let Some(root) = inv.context.include_root else {
            return inv.error_div("include", "File inclusion is disabled in this context");
        };
        let Some(path) = resolve_included(root, relative) else {
            return inv.error_div("include", &format!("Invalid include path: {relative}"));
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                return inv.error_div(
                    "include",
                    &format!("Could not include {relative}: {e}"),
                );
            }
        };
        let depth = INCLUDE_DEPTH.with(Cell::get);
        if depth >= MAX_INCLUDE_DEPTH {
            return inv.error_div(
                "include",
                &format!("Include depth limit exceeded at {relative}"),
            );
        }
        INCLUDE_DEPTH.with(|d| d.set(depth + 1));
        let nodes = crate::parser::parse_fragment(&content);
        INCLUDE_DEPTH.with(|d| d.set(depth));
        nodes
    }
}

/// `literalinclude`: include a file verbatim as a code block.
pub struct LiteralIncludeDirective;

static LITERALINCLUDE_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "literalinclude",
    fields: &[FieldSpec::str("language")],
};

impl DirectiveHandler for LiteralIncludeDirective {
    fn names(&self) -> &'static [&'static str] {
        &["literalinclude"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = LITERALINCLUDE_OPTIONS.parse(inv.options);
        let relative = inv.title.unwrap_or("").trim();
        let Some(root) = inv.context.include_root else {
            return inv.error_div("include", "File inclusion is disabled in this context");
        };
        let Some(path) = resolve_included(root, relative) else {
            return inv.error_div("include", &format!("Invalid include path: {relative}"));
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => vec![AstNode::CodeBlock {
                location: inv.location,
                info: opts.str_opt("language").map(str::to_string),
                raw,
            }],
            Err(e) => inv.error_div(
                "include",
                &format!("Could not include {relative}: {e}"),
            ),
        }
    }
}

/// Navigation placeholders the template layer fills in: the content core
/// has no site graph, so these render stable anchor elements.
pub struct NavPlaceholderDirective;

impl DirectiveHandler for NavPlaceholderDirective {
    fn names(&self) -> &'static [&'static str] {
        &["breadcrumbs", "siblings", "prev-next", "related"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        vec![inv.html(format!(
            "<nav class=\"{name}\" data-bengal-nav=\"{name}\"></nav>\n",
            name = inv.name
        ))]
    }
}

/// `rubric`: an unnumbered informal heading.
pub struct RubricDirective;

impl DirectiveHandler for RubricDirective {
    fn names(&self) -> &'static [&'static str] {
        &["rubric"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let text = inv.title.unwrap_or("");
        vec![inv.html(format!("<p class=\"rubric\">{}</p>\n", escape(text)))]
    }
}

/// `glossary`: definition-list styling wrapper.
pub struct GlossaryDirective;

impl DirectiveHandler for GlossaryDirective {
    fn names(&self) -> &'static [&'static str] {
        &["glossary"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html("<div class=\"glossary\">\n"));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}

/// `checklist`: styling wrapper for task lists.
pub struct ChecklistDirective;

impl DirectiveHandler for ChecklistDirective {
    fn names(&self) -> &'static [&'static str] {
        &["checklist"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html("<div class=\"checklist\">\n"));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}

/// `target`: invisible anchor for cross-references.
pub struct TargetDirective;

impl DirectiveHandler for TargetDirective {
    fn names(&self) -> &'static [&'static str] {
        &["target"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let id = slugify(inv.title.unwrap_or(""));
        vec![inv.html(format!(
            "<span id=\"{id}\" class=\"anchor-target\"></span>"
        ))]
    }
}

/// `since` / `deprecated` / `changed`: version annotations.
pub struct VersionNoteDirective;

impl DirectiveHandler for VersionNoteDirective {
    fn names(&self) -> &'static [&'static str] {
        &["since", "deprecated", "changed"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let version = inv.title.unwrap_or("").trim();
        let (class, label) = match inv.name {
            "deprecated" => ("deprecated", format!("Deprecated since version {version}")),
            "changed" => ("versionchanged", format!("Changed in version {version}")),
            _ => ("versionadded", format!("New in version {version}")),
        };
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<div class=\"version-note {class}\">\n<span class=\"version-label\">{}</span>\n",
            escape(&label)
        )));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}
