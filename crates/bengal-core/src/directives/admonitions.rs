//! Admonition directives (note, tip, warning, ...).

use crate::ast::AstNode;

use super::{DirectiveHandler, DirectiveInvocation};

const ADMONITION_NAMES: &[&str] = &[
    "note", "tip", "warning", "danger", "error", "info", "example", "success", "caution",
    "seealso",
];

/// One handler class covers every admonition type; the name selects the
/// CSS modifier and the default title.
pub struct AdmonitionDirective;

impl DirectiveHandler for AdmonitionDirective {
    fn names(&self) -> &'static [&'static str] {
        ADMONITION_NAMES
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let title = inv.title.map_or_else(
            || default_title(inv.name),
            |t| html_escape::encode_text(t).into_owned(),
        );
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<div class=\"admonition {}\">\n<p class=\"admonition-title\">{title}</p>\n",
            inv.name
        )));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}

fn default_title(name: &str) -> String {
    match name {
        "seealso" => "See Also".to_string(),
        _ => {
            let mut chars = name.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        }
    }
}
