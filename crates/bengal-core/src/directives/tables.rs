//! Table directives: `list-table` and `data-table`.

use crate::ast::AstNode;

use super::{
    DirectiveHandler, DirectiveInvocation, FieldSpec, OptionsSpec,
};

static LIST_TABLE_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "list-table",
    fields: &[
        FieldSpec::int("header_rows").aliased("header-rows"),
        FieldSpec::list("widths"),
        FieldSpec::str("css_class").aliased("class"),
    ],
};

/// `list-table`: builds a table from a two-level nested list.
///
/// The body must contain a list whose items each hold a nested list; the
/// outer items become rows and the inner items cells. `:header-rows:`
/// promotes the first N rows to `<th>` cells.
pub struct ListTableDirective;

impl DirectiveHandler for ListTableDirective {
    fn names(&self) -> &'static [&'static str] {
        &["list-table"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = LIST_TABLE_OPTIONS.parse(inv.options);
        let header_rows = usize::try_from(opts.int_or("header_rows", 0).max(0)).unwrap_or(0);

        let Some(rows) = extract_rows(inv.children) else {
            return inv.error_div(
                "list-table",
                "list-table requires a bullet list of rows, each containing a nested list of cells",
            );
        };

        let mut nodes = Vec::new();
        let mut classes = String::from("table-wrapper list-table");
        if let Some(extra) = opts.str_opt("css_class") {
            classes.push(' ');
            classes.push_str(&html_escape::encode_text(extra));
        }
        nodes.push(inv.html(format!("<div class=\"{classes}\">\n<table>\n")));
        if let Some(title) = inv.title {
            nodes.push(inv.html(format!(
                "<caption>{}</caption>\n",
                html_escape::encode_text(title)
            )));
        }
        for (index, cells) in rows.iter().enumerate() {
            let header = index < header_rows;
            nodes.push(inv.html("<tr>\n"));
            let tag = if header { "th" } else { "td" };
            for cell in cells {
                nodes.push(inv.html(format!("<{tag}>")));
                nodes.extend_from_slice(cell);
                nodes.push(inv.html(format!("</{tag}>\n")));
            }
            nodes.push(inv.html("</tr>\n"));
        }
        nodes.push(inv.html("</table>\n</div>\n"));
        nodes
    }
}

/// Rows of cell content extracted from the nested-list body.
fn extract_rows(children: &[AstNode]) -> Option<Vec<Vec<&[AstNode]>>> {
    let list_items = children.iter().find_map(|node| match node {
        AstNode::List { items, .. } => Some(items),
        _ => None,
    })?;
    let mut rows = Vec::with_capacity(list_items.len());
    for item in list_items {
        let inner = item.children()?.iter().find_map(|node| match node {
            AstNode::List { items, .. } => Some(items),
            _ => None,
        })?;
        let cells: Vec<&[AstNode]> = inner
            .iter()
            .filter_map(|cell| cell.children())
            .collect();
        rows.push(cells);
    }
    Some(rows)
}

static DATA_TABLE_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "data-table",
    fields: &[
        FieldSpec::bool("sortable"),
        FieldSpec::bool("searchable"),
        FieldSpec::int("page_size").aliased("page-size"),
    ],
};

/// `data-table`: enhancement wrapper around an ordinary table body.
///
/// Emits data attributes the client-side enhancer reads; the table itself
/// is authored as regular markdown inside the directive.
pub struct DataTableDirective;

impl DirectiveHandler for DataTableDirective {
    fn names(&self) -> &'static [&'static str] {
        &["data-table"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = DATA_TABLE_OPTIONS.parse(inv.options);
        let mut attrs = String::new();
        if opts.bool_or("sortable", false) {
            attrs.push_str(" data-sortable=\"true\"");
        }
        if opts.bool_or("searchable", false) {
            attrs.push_str(" data-searchable=\"true\"");
        }
        let page_size = opts.int_or("page_size", 0);
        if page_size > 0 {
            attrs.push_str(&format!(" data-page-size=\"{page_size}\""));
        }
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!("<div class=\"data-table\"{attrs}>\n")));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</div>\n"));
        nodes
    }
}
