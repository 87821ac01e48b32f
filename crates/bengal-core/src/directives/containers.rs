//! Container directives: tab sets, card grids, and step sequences.

use crate::ast::AstNode;

use super::{
    DirectiveContract, DirectiveHandler, DirectiveInvocation, FieldSpec, OptionsSpec,
};

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// `tab-set` / `tabs`: container for tab items.
pub struct TabSetDirective;

impl DirectiveHandler for TabSetDirective {
    fn names(&self) -> &'static [&'static str] {
        &["tab-set", "tabs"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            allowed_children: Some(&["tab-item"]),
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html("<div class=\"tab-set tabs\">\n"));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}

/// `tab-item` / `tab`: one labeled pane inside a tab set.
pub struct TabItemDirective;

static TAB_ITEM_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "tab-item",
    fields: &[FieldSpec::bool("selected"), FieldSpec::str("sync")],
};

impl DirectiveHandler for TabItemDirective {
    fn names(&self) -> &'static [&'static str] {
        &["tab-item", "tab"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_parent: Some("tab-set"),
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = TAB_ITEM_OPTIONS.parse(inv.options);
        let label = inv.title.map_or_else(|| "Tab".to_string(), escape);
        let selected = if opts.bool_or("selected", false) {
            " tab-item-selected"
        } else {
            ""
        };
        let sync = opts
            .str_opt("sync")
            .map(|key| format!(" data-sync=\"{}\"", escape(key)))
            .unwrap_or_default();
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<div class=\"tab-item{selected}\"{sync}>\n<div class=\"tab-label\">{label}</div>\n<div class=\"tab-content\">\n"
        )));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n</div>\n"));
        nodes
    }
}

/// `cards`: grid container for `card` children.
pub struct CardsDirective;

static CARDS_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "cards",
    fields: &[
        FieldSpec::int("columns"),
        FieldSpec::choice("gap", &["small", "medium", "large"]),
    ],
};

impl DirectiveHandler for CardsDirective {
    fn names(&self) -> &'static [&'static str] {
        &["cards"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            allowed_children: Some(&["card"]),
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = CARDS_OPTIONS.parse(inv.options);
        let columns = opts.int_or("columns", 0);
        let columns_attr = if columns > 0 {
            format!(" data-columns=\"{columns}\"")
        } else {
            String::new()
        };
        let gap = opts.str_or("gap", "medium");
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<div class=\"card-grid card-gap-{gap}\"{columns_attr}>\n"
        )));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}

/// `card`: one card in a grid.
pub struct CardDirective;

static CARD_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "card",
    fields: &[FieldSpec::str("link"), FieldSpec::str("icon")],
};

impl DirectiveHandler for CardDirective {
    fn names(&self) -> &'static [&'static str] {
        &["card"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_parent: Some("cards"),
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = CARD_OPTIONS.parse(inv.options);
        let mut open = String::from("<div class=\"card\">\n");
        if let Some(link) = opts.str_opt("link") {
            open = format!("<a class=\"card card-link\" href=\"{}\">\n", escape(link));
        }
        if let Some(icon) = opts.str_opt("icon") {
            open.push_str(&format!(
                "<span class=\"card-icon icon-{}\" aria-hidden=\"true\"></span>\n",
                escape(icon)
            ));
        }
        if let Some(title) = inv.title {
            open.push_str(&format!("<div class=\"card-title\">{}</div>\n", escape(title)));
        }
        open.push_str("<div class=\"card-body\">\n");
        let close = if opts.str_opt("link").is_some() {
            "</div>\n</a>\n"
        } else {
            "</div>\n</div>\n"
        };
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(open));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html(close));
        nodes
    }
}

/// `steps`: ordered sequence rendered as a counter-styled list.
pub struct StepsDirective;

static STEPS_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "steps",
    fields: &[FieldSpec::int("start")],
};

impl DirectiveHandler for StepsDirective {
    fn names(&self) -> &'static [&'static str] {
        &["steps"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            allowed_children: Some(&["step"]),
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = STEPS_OPTIONS.parse(inv.options);
        let start = opts.int_or("start", 1).max(1);
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<div class=\"steps\" start=\"{start}\" style=\"counter-reset: step {}\">\n<ol class=\"steps-list\" start=\"{start}\">\n",
            start - 1
        )));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</ol>\n</div>\n"));
        nodes
    }
}

/// `step`: one entry in a steps sequence.
pub struct StepDirective;

static STEP_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "step",
    fields: &[
        FieldSpec::bool("optional"),
        FieldSpec::str("duration"),
        FieldSpec::str("description"),
    ],
};

impl DirectiveHandler for StepDirective {
    fn names(&self) -> &'static [&'static str] {
        &["step"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_parent: Some("steps"),
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = STEP_OPTIONS.parse(inv.options);
        let optional = opts.bool_or("optional", false);
        let mut open = format!(
            "<li class=\"step{}\">\n",
            if optional { " step-optional" } else { "" }
        );
        open.push_str("<div class=\"step-header\">");
        if let Some(title) = inv.title {
            open.push_str(&format!("<span class=\"step-title\">{}</span>", escape(title)));
        }
        if optional {
            open.push_str("<span class=\"step-badge-optional\">Optional</span>");
        }
        if let Some(duration) = opts.str_opt("duration") {
            open.push_str(&format!(
                "<span class=\"step-duration\">{}</span>",
                escape(duration)
            ));
        }
        open.push_str("</div>\n");
        if let Some(description) = opts.str_opt("description") {
            open.push_str(&format!(
                "<p class=\"step-description\">{}</p>\n",
                escape(description)
            ));
        }
        open.push_str("<div class=\"step-content\">\n");
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(open));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n</li>\n"));
        nodes
    }
}
