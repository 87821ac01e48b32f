//! Disclosure directive (`dropdown` / `details`).

use crate::ast::AstNode;

use super::{DirectiveHandler, DirectiveInvocation, FieldSpec, OptionsSpec};

static DROPDOWN_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "dropdown",
    fields: &[
        FieldSpec::bool("open"),
        FieldSpec::str("css_class").aliased("class"),
        FieldSpec::str("icon"),
    ],
};

/// Collapsible block rendered as a native `<details>` element.
pub struct DropdownDirective;

impl DirectiveHandler for DropdownDirective {
    fn names(&self) -> &'static [&'static str] {
        &["dropdown", "details"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = DROPDOWN_OPTIONS.parse(inv.options);
        let mut classes = String::from("dropdown");
        if let Some(extra) = opts.str_opt("css_class") {
            classes.push(' ');
            classes.push_str(&html_escape::encode_text(extra));
        }
        let open = if opts.bool_or("open", false) { " open" } else { "" };
        let summary = inv.title.map_or_else(
            || "Details".to_string(),
            |t| html_escape::encode_text(t).into_owned(),
        );
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<details class=\"{classes}\"{open}>\n<summary>{summary}</summary>\n<div class=\"dropdown-content\">\n"
        )));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n</details>\n"));
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Location, OptionsRecord};
    use crate::directives::DirectiveContext;

    fn expand(options: OptionsRecord, title: Option<&str>) -> String {
        let context = DirectiveContext::default();
        let inv = DirectiveInvocation {
            name: "dropdown",
            title,
            options: &options,
            children: &[],
            location: Location::at(1),
            context: &context,
        };
        DropdownDirective
            .expand(&inv)
            .iter()
            .filter_map(|n| match n {
                AstNode::RawHtml { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_renders_details_with_summary() {
        let html = expand(OptionsRecord::new(), Some("Click me"));
        assert!(html.contains("<details class=\"dropdown\">"));
        assert!(html.contains("<summary>Click me</summary>"));
    }

    #[test]
    fn test_open_option() {
        let options: OptionsRecord = [("open".to_string(), "true".to_string())].into();
        assert!(expand(options, None).contains("<details class=\"dropdown\" open>"));
    }
}
