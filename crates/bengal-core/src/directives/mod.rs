//! Directive system: fenced extension blocks with registered handlers.
//!
//! Directives are parsed by the fence scanner (see [`fence`]) into AST
//! nodes; at render time the [`DirectiveRegistry`] looks up the stateless
//! handler for the node's name and expands it into ordinary AST nodes
//! (usually raw-HTML wrappers around the parsed children).
//!
//! The registry is immutable after startup. [`known_directive_names`] is
//! the single source of truth for the name set; building the registry
//! asserts that no name is claimed by two handler classes.

pub mod admonitions;
pub mod code_tabs;
pub mod containers;
pub mod dropdown;
pub mod embeds;
pub(crate) mod fence;
pub mod misc;
pub mod options;
pub mod tables;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::ast::{AstNode, Location, OptionsRecord};
use crate::diagnostics::Diagnostic;

pub use fence::validate_nested_fences;
pub use options::{FieldKind, FieldSpec, OptionsSpec, ParsedOptions};

/// Declarative constraints a directive places on its surroundings.
///
/// Violations are diagnostics (warnings), never hard errors: the tree
/// always renders.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveContract {
    /// Directive names allowed as direct directive children; `None` means
    /// unrestricted.
    pub allowed_children: Option<&'static [&'static str]>,
    /// Name of the directive this one must be nested inside.
    pub required_parent: Option<&'static str>,
    /// Options that must be present for valid output.
    pub required_options: &'static [&'static str],
}

/// Context passed to handlers at expansion time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveContext<'a> {
    /// Sandbox root for `include`/`literalinclude` path resolution.
    /// `None` disables file inclusion.
    pub include_root: Option<&'a std::path::Path>,
}

/// A directive occurrence handed to its handler.
#[derive(Debug, Clone, Copy)]
pub struct DirectiveInvocation<'a> {
    /// Name as written in the source (one of the handler's aliases).
    pub name: &'a str,
    /// Title text from the opener line.
    pub title: Option<&'a str>,
    /// Raw option record.
    pub options: &'a OptionsRecord,
    /// Parsed body content.
    pub children: &'a [AstNode],
    /// Opener location.
    pub location: Location,
    /// Expansion context.
    pub context: &'a DirectiveContext<'a>,
}

impl DirectiveInvocation<'_> {
    /// Raw-HTML node at this invocation's location.
    #[must_use]
    pub fn html(&self, content: impl Into<String>) -> AstNode {
        AstNode::raw_html(self.location, content)
    }

    /// A visible error div replacing the directive's output.
    #[must_use]
    pub fn error_div(&self, kind: &str, message: &str) -> Vec<AstNode> {
        tracing::warn!(
            directive = self.name,
            line = self.location.line,
            "{message}"
        );
        vec![self.html(format!(
            "<div class=\"{kind}-error\">{}</div>",
            html_escape::encode_text(message)
        ))]
    }
}

/// A stateless directive handler.
///
/// Handlers are singletons shared across threads; all state lives in the
/// invocation. Output is a subtree of ordinary AST nodes, with `RawHtml`
/// as the escape hatch for already-escaped markup.
pub trait DirectiveHandler: Send + Sync {
    /// Names this class claims (first is canonical).
    fn names(&self) -> &'static [&'static str];

    /// Structural constraints, if any.
    fn contract(&self) -> Option<DirectiveContract> {
        None
    }

    /// Expand an invocation into renderable nodes.
    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode>;
}

/// Immutable name → handler table.
pub struct DirectiveRegistry {
    handlers: Vec<Arc<dyn DirectiveHandler>>,
    by_name: BTreeMap<&'static str, usize>,
}

/// Aliases intentionally claimed by more than one class. Currently none;
/// listed explicitly so the duplicate assertion stays meaningful.
const SHARED_ALIASES: &[&str] = &[];

impl DirectiveRegistry {
    /// Build a fresh registry with every built-in handler.
    ///
    /// Panics when two classes claim the same name without it being listed
    /// in [`SHARED_ALIASES`]; this runs once at startup (and from tests).
    #[allow(clippy::panic)]
    #[must_use]
    pub fn fresh() -> Self {
        let handlers: Vec<Arc<dyn DirectiveHandler>> = vec![
            Arc::new(admonitions::AdmonitionDirective),
            Arc::new(containers::TabSetDirective),
            Arc::new(containers::TabItemDirective),
            Arc::new(containers::CardsDirective),
            Arc::new(containers::CardDirective),
            Arc::new(containers::StepsDirective),
            Arc::new(containers::StepDirective),
            Arc::new(dropdown::DropdownDirective),
            Arc::new(tables::ListTableDirective),
            Arc::new(tables::DataTableDirective),
            Arc::new(code_tabs::CodeTabsDirective),
            Arc::new(embeds::YouTubeDirective),
            Arc::new(embeds::VimeoDirective),
            Arc::new(embeds::VideoDirective),
            Arc::new(embeds::GistDirective),
            Arc::new(embeds::CodePenDirective),
            Arc::new(embeds::CodeSandboxDirective),
            Arc::new(embeds::StackBlitzDirective),
            Arc::new(embeds::AsciinemaDirective),
            Arc::new(embeds::FigureDirective),
            Arc::new(embeds::AudioDirective),
            Arc::new(misc::BadgeDirective),
            Arc::new(misc::ButtonDirective),
            Arc::new(misc::IconDirective),
            Arc::new(misc::IncludeDirective),
            Arc::new(misc::LiteralIncludeDirective),
            Arc::new(misc::NavPlaceholderDirective),
            Arc::new(misc::RubricDirective),
            Arc::new(misc::GlossaryDirective),
            Arc::new(misc::ChecklistDirective),
            Arc::new(misc::TargetDirective),
            Arc::new(misc::VersionNoteDirective),
        ];

        let mut by_name = BTreeMap::new();
        for (index, handler) in handlers.iter().enumerate() {
            for &name in handler.names() {
                let previous = by_name.insert(name, index);
                if previous.is_some() && !SHARED_ALIASES.contains(&name) {
                    panic!("directive name '{name}' is claimed by two handler classes");
                }
            }
        }
        Self { handlers, by_name }
    }

    /// Process-wide registry, built once at first use.
    #[must_use]
    pub fn global() -> &'static Self {
        static REGISTRY: Lazy<DirectiveRegistry> = Lazy::new(DirectiveRegistry::fresh);
        &REGISTRY
    }

    /// Look up a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn DirectiveHandler> {
        self.by_name
            .get(name)
            .map(|&index| self.handlers[index].as_ref())
    }

    /// Every registered directive name.
    #[must_use]
    pub fn names(&self) -> BTreeSet<&'static str> {
        self.by_name.keys().copied().collect()
    }

    /// Whether two names resolve to the same handler class.
    #[must_use]
    pub fn same_class(&self, a: &str, b: &str) -> bool {
        match (self.by_name.get(a), self.by_name.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

/// Single source of truth for the registered directive name set.
#[must_use]
pub fn known_directive_names() -> BTreeSet<&'static str> {
    DirectiveRegistry::global().names()
}

/// Validate directive contracts over a parsed tree.
///
/// Checks `required_parent` ancestry, `allowed_children`, required
/// options, and unknown names. Every violation is a warning diagnostic;
/// the tree is never rejected.
pub fn validate_tree(ast: &[AstNode], diagnostics: &mut Vec<Diagnostic>) {
    let registry = DirectiveRegistry::global();
    let mut ancestors: Vec<String> = Vec::new();
    validate_nodes(ast, registry, &mut ancestors, diagnostics);
}

fn validate_nodes(
    nodes: &[AstNode],
    registry: &DirectiveRegistry,
    ancestors: &mut Vec<String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for node in nodes {
        if let AstNode::Directive {
            name,
            options,
            children,
            location,
            ..
        } = node
        {
            match registry.get(name) {
                None => diagnostics.push(Diagnostic::warn(
                    format!("Unknown directive '{name}'; rendering its content unchanged"),
                    location.line,
                )),
                Some(handler) => {
                    if let Some(contract) = handler.contract() {
                        if let Some(parent) = contract.required_parent {
                            let satisfied = ancestors
                                .iter()
                                .any(|a| registry.same_class(a, parent));
                            if !satisfied {
                                diagnostics.push(Diagnostic::warn(
                                    format!(
                                        "Directive '{name}' should be nested inside '{parent}'"
                                    ),
                                    location.line,
                                ));
                            }
                        }
                        for &required in contract.required_options {
                            if !options.contains_key(required) {
                                diagnostics.push(Diagnostic::warn(
                                    format!(
                                        "Directive '{name}' is missing required option :{required}:"
                                    ),
                                    location.line,
                                ));
                            }
                        }
                        if let Some(allowed) = contract.allowed_children {
                            for child in children {
                                if let AstNode::Directive {
                                    name: child_name,
                                    location: child_location,
                                    ..
                                } = child
                                {
                                    let ok = allowed
                                        .iter()
                                        .any(|a| registry.same_class(a, child_name));
                                    if !ok {
                                        diagnostics.push(Diagnostic::warn(
                                            format!(
                                                "Directive '{child_name}' is not an allowed child \
                                                 of '{name}'"
                                            ),
                                            child_location.line,
                                        ));
                                    }
                                }
                            }
                        }
                    }
                }
            }
            ancestors.push(name.clone());
            validate_nodes(children, registry, ancestors, diagnostics);
            ancestors.pop();
        } else if let Some(children) = node.children() {
            validate_nodes(children, registry, ancestors, diagnostics);
        }
    }
}
