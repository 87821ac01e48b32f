//! Typed option parsing for directive configuration.
//!
//! Each directive declares a static [`OptionsSpec`] describing its fields:
//! name, optional alias (`:class:` → `css_class`), target type, and an
//! optional allowed-value set. Parsing coerces the raw `:key: value`
//! strings once per invocation with no runtime type dispatch beyond the
//! precompiled field table.
//!
//! Coercions: bool (`true|1|yes|""` → true), int, float, comma-separated
//! list, string passthrough. Unknown keys are logged and dropped; values
//! outside an allowed set fall back to the default with a warning.

use std::collections::BTreeMap;

use crate::ast::OptionsRecord;

/// Target type of one option field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `true|1|yes|""` → true, anything else false.
    Bool,
    /// Integer; invalid input coerces to 0.
    Int,
    /// Float; invalid input coerces to 0.0.
    Float,
    /// Comma-separated list of trimmed strings.
    List,
    /// Raw string passthrough.
    Str,
}

/// One declared option field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical field name.
    pub name: &'static str,
    /// Accepted alias in directive syntax (e.g. `class` for `css_class`).
    pub alias: Option<&'static str>,
    /// Coercion target.
    pub kind: FieldKind,
    /// Allowed values; empty means unrestricted.
    pub allowed: &'static [&'static str],
}

impl FieldSpec {
    /// Unrestricted string field.
    #[must_use]
    pub const fn str(name: &'static str) -> Self {
        Self {
            name,
            alias: None,
            kind: FieldKind::Str,
            allowed: &[],
        }
    }

    /// Boolean flag field.
    #[must_use]
    pub const fn bool(name: &'static str) -> Self {
        Self {
            name,
            alias: None,
            kind: FieldKind::Bool,
            allowed: &[],
        }
    }

    /// Integer field.
    #[must_use]
    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            alias: None,
            kind: FieldKind::Int,
            allowed: &[],
        }
    }

    /// Comma-separated list field.
    #[must_use]
    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            alias: None,
            kind: FieldKind::List,
            allowed: &[],
        }
    }

    /// String field restricted to a value set.
    #[must_use]
    pub const fn choice(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self {
            name,
            alias: None,
            kind: FieldKind::Str,
            allowed,
        }
    }

    /// Attach a syntax alias.
    #[must_use]
    pub const fn aliased(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }
}

/// Static option table for one directive class.
#[derive(Debug, Clone, Copy)]
pub struct OptionsSpec {
    /// Directive class name used in log events.
    pub directive: &'static str,
    /// Declared fields.
    pub fields: &'static [FieldSpec],
}

/// A coerced option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String list.
    List(Vec<String>),
    /// String.
    Str(String),
}

/// Parsed, typed options with defaulting getters.
#[derive(Debug, Default, Clone)]
pub struct ParsedOptions {
    values: BTreeMap<&'static str, OptionValue>,
}

impl OptionsSpec {
    /// Coerce a raw option record against this spec.
    #[must_use]
    pub fn parse(&self, raw: &OptionsRecord) -> ParsedOptions {
        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let normalized = key.replace('-', "_");
            let field = self.fields.iter().find(|f| {
                f.name == normalized || f.alias == Some(key.as_str())
            });
            let Some(field) = field else {
                tracing::debug!(
                    directive = self.directive,
                    option = key.as_str(),
                    "dropping unknown directive option"
                );
                continue;
            };
            let coerced = coerce(value, field.kind);
            if !field.allowed.is_empty() {
                let as_str = match &coerced {
                    OptionValue::Str(s) => s.as_str(),
                    _ => "",
                };
                if !field.allowed.contains(&as_str) {
                    tracing::warn!(
                        directive = self.directive,
                        option = key.as_str(),
                        value = value.as_str(),
                        allowed = ?field.allowed,
                        "invalid directive option value, using default"
                    );
                    continue;
                }
            }
            values.insert(field.name, coerced);
        }
        ParsedOptions { values }
    }
}

fn coerce(value: &str, kind: FieldKind) -> OptionValue {
    match kind {
        FieldKind::Bool => OptionValue::Bool(matches!(
            value.to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | ""
        )),
        FieldKind::Int => OptionValue::Int(value.trim().parse().unwrap_or(0)),
        FieldKind::Float => OptionValue::Float(value.trim().parse().unwrap_or(0.0)),
        FieldKind::List => OptionValue::List(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        FieldKind::Str => OptionValue::Str(value.to_string()),
    }
}

impl ParsedOptions {
    /// Whether the option was provided (and valid).
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Boolean value, defaulting to `default`.
    #[must_use]
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(OptionValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Integer value, defaulting to `default`.
    #[must_use]
    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(i)) => *i,
            _ => default,
        }
    }

    /// String value, defaulting to `default`.
    #[must_use]
    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.values.get(name) {
            Some(OptionValue::Str(s)) => s.as_str(),
            _ => default,
        }
    }

    /// String value if present and non-empty.
    #[must_use]
    pub fn str_opt(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::Str(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// String value if present (empty allowed).
    #[must_use]
    pub fn str_present(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// List value, empty when absent.
    #[must_use]
    pub fn list(&self, name: &str) -> &[String] {
        match self.values.get(name) {
            Some(OptionValue::List(l)) => l,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SPEC: OptionsSpec = OptionsSpec {
        directive: "test",
        fields: &[
            FieldSpec::bool("open"),
            FieldSpec::int("start"),
            FieldSpec::list("tags"),
            FieldSpec::choice("gap", &["small", "medium", "large"]),
            FieldSpec::str("css_class").aliased("class"),
        ],
    };

    fn raw(pairs: &[(&str, &str)]) -> OptionsRecord {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_bool_coercions() {
        for value in ["true", "1", "yes", ""] {
            let opts = SPEC.parse(&raw(&[("open", value)]));
            assert!(opts.bool_or("open", false), "value: {value:?}");
        }
        let opts = SPEC.parse(&raw(&[("open", "no")]));
        assert!(!opts.bool_or("open", true));
    }

    #[test]
    fn test_int_coercion_and_default() {
        let opts = SPEC.parse(&raw(&[("start", "3")]));
        assert_eq!(opts.int_or("start", 1), 3);
        let opts = SPEC.parse(&raw(&[("start", "abc")]));
        assert_eq!(opts.int_or("start", 1), 0);
        let opts = SPEC.parse(&raw(&[]));
        assert_eq!(opts.int_or("start", 1), 1);
    }

    #[test]
    fn test_list_coercion() {
        let opts = SPEC.parse(&raw(&[("tags", "a, b , ,c")]));
        assert_eq!(opts.list("tags"), &["a", "b", "c"]);
    }

    #[test]
    fn test_unknown_option_dropped() {
        let opts = SPEC.parse(&raw(&[("mystery", "x")]));
        assert!(!opts.has("mystery"));
    }

    #[test]
    fn test_allowed_values_fall_back_to_default() {
        let opts = SPEC.parse(&raw(&[("gap", "huge")]));
        assert_eq!(opts.str_or("gap", "medium"), "medium");
        let opts = SPEC.parse(&raw(&[("gap", "large")]));
        assert_eq!(opts.str_or("gap", "medium"), "large");
    }

    #[test]
    fn test_alias_resolution() {
        let opts = SPEC.parse(&raw(&[("class", "wide")]));
        assert_eq!(opts.str_or("css_class", ""), "wide");
    }

    #[test]
    fn test_hyphen_normalization() {
        let opts = SPEC.parse(&raw(&[("css-class", "wide")]));
        assert_eq!(opts.str_or("css_class", ""), "wide");
    }
}
