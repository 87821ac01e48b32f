//! `code-tabs`: tabbed UI over consecutive fenced code blocks.

use crate::ast::AstNode;

use super::{DirectiveHandler, DirectiveInvocation};

/// Wraps each fenced code block in the body in a labeled tab pane; the
/// label is the block's language info string. Non-code content passes
/// through unchanged.
pub struct CodeTabsDirective;

impl DirectiveHandler for CodeTabsDirective {
    fn names(&self) -> &'static [&'static str] {
        &["code-tabs", "code_tabs"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let mut nodes = Vec::with_capacity(inv.children.len() * 3 + 2);
        nodes.push(inv.html("<div class=\"code-tabs\">\n"));
        for child in inv.children {
            if let AstNode::CodeBlock { info, .. } = child {
                let lang = info
                    .as_deref()
                    .and_then(|i| i.split_whitespace().next())
                    .unwrap_or("text");
                let label = html_escape::encode_text(lang);
                nodes.push(inv.html(format!(
                    "<div class=\"code-tab\" data-lang=\"{label}\">\n<div class=\"code-tab-label\">{label}</div>\n"
                )));
                nodes.push(child.clone());
                nodes.push(inv.html("</div>\n"));
            } else {
                nodes.push(child.clone());
            }
        }
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Location, OptionsRecord};
    use crate::directives::DirectiveContext;

    #[test]
    fn test_labels_from_info_strings() {
        let children = [
            AstNode::CodeBlock {
                location: Location::at(2),
                info: Some("python".into()),
                raw: "print('hi')\n".into(),
            },
            AstNode::CodeBlock {
                location: Location::at(6),
                info: Some("rust".into()),
                raw: "fn main() {}\n".into(),
            },
        ];
        let options = OptionsRecord::new();
        let context = DirectiveContext::default();
        let inv = DirectiveInvocation {
            name: "code-tabs",
            title: None,
            options: &options,
            children: &children,
            location: Location::at(1),
            context: &context,
        };
        let nodes = CodeTabsDirective.expand(&inv);
        let html: String = nodes
            .iter()
            .filter_map(|n| match n {
                AstNode::RawHtml { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert!(html.contains("data-lang=\"python\""));
        assert!(html.contains("data-lang=\"rust\""));
        let python_at = html.find("python").unwrap();
        let rust_at = html.find("rust").unwrap();
        assert!(python_at < rust_at);
    }
}
