use crate::model::Variables;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Right-hand values that compare against an unset variable.
const NULL_LITERALS: &[&str] = &["null", "nil", "None"];

static VARIABLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z0-9_]+)\}|([A-Za-z0-9_]+))").expect("valid variable regex")
});

fn ref_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// Expand `$NAME` and `${NAME}` from `vars`. Unset names expand to nothing.
///
/// Only `vars` is consulted, never the process environment.
pub fn substitute(text: &str, vars: &Variables) -> String {
    VARIABLE_REF
        .replace_all(text, |caps: &Captures<'_>| {
            vars.get(ref_name(caps)).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches('"')
}

/// One `only:variables` entry: `LEFT` or `LEFT == RIGHT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    left: String,
    right: Option<String>,
}

impl Condition {
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split("==");
        let left = unquote(parts.next().unwrap_or_default()).to_string();
        let right = parts.next().map(String::from);
        Self { left, right }
    }

    /// Evaluate against one job's variables.
    pub fn matches(&self, vars: &Variables) -> bool {
        let left = substitute(&self.left, vars);
        let Some(right) = &self.right else {
            // presence check: `$VARIABLE`
            return !left.is_empty();
        };
        // the empty and null checks look at the text as written, before expansion
        let literal = unquote(right);
        if literal.is_empty() {
            return !left.is_empty();
        }
        if NULL_LITERALS.contains(&literal) && references_unset(&self.left, vars) {
            return true;
        }
        // an unset variable on the right never equals anything
        if references_unset(right, vars) {
            return false;
        }
        left == unquote(&substitute(right, vars))
    }
}

/// Whether `text` names a variable that `vars` does not define.
fn references_unset(text: &str, vars: &Variables) -> bool {
    VARIABLE_REF
        .captures_iter(text)
        .any(|caps| !vars.contains_key(ref_name(&caps)))
}
