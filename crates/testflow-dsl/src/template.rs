//! Placeholder substitution for action code previews.
//!
//! Action templates carry code such as `click({selector})`. Resolution
//! replaces each `{name}` with the step's value for `name`. Placeholders
//! with no matching parameter are left as written so that a template and a
//! step that have drifted apart stay visible in the preview.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::flow::ParameterMap;

lazy_static! {
    // `{name}`: no braces in name, no whitespace at either end of it
    static ref PLACEHOLDER_REGEX: Regex =
        Regex::new(r"\{([^{}\s](?:[^{}]*[^{}\s])?)\}").unwrap();
}

/// Outcome of resolving a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Code with every known placeholder substituted
    pub code: String,

    /// Placeholder names left in `code`, in order of first appearance
    pub unresolved: Vec<String>,
}

impl Resolution {
    /// True when every placeholder had a parameter
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Substitute parameter values into `code`.
///
/// Single pass: substituted values are never scanned again.
pub fn resolve(code: &str, params: &ParameterMap) -> String {
    PLACEHOLDER_REGEX
        .replace_all(code, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Substitute and report which placeholders were left unresolved
pub fn resolve_with_report(code: &str, params: &ParameterMap) -> Resolution {
    Resolution {
        code: resolve(code, params),
        unresolved: unresolved_placeholders(code, params),
    }
}

/// Placeholder names in order of appearance (duplicates kept)
pub fn placeholders(code: &str) -> Vec<&str> {
    PLACEHOLDER_REGEX
        .captures_iter(code)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Placeholder names with no parameter, deduplicated, in order of first appearance
pub fn unresolved_placeholders(code: &str, params: &ParameterMap) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for name in placeholders(code) {
        if !params.contains_key(name) && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(pairs: &[(&str, &str)]) -> ParameterMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolves_known_placeholder() {
        assert_eq!(resolve("click {sel}", &params(&[("sel", "#btn")])), "click #btn");
        assert_eq!(resolve("click({selector})", &params(&[("selector", "#login")])), "click(#login)");
    }

    #[test]
    fn test_unknown_placeholder_is_left_in_place() {
        assert_eq!(resolve("click {sel}", &ParameterMap::new()), "click {sel}");

        let report = resolve_with_report("type({selector}, {text})", &params(&[("selector", "#q")]));
        assert_eq!(report.code, "type(#q, {text})");
        assert_eq!(report.unresolved, vec!["text"]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_empty_value_substitutes_empty_string() {
        assert_eq!(resolve("wait({ms})", &params(&[("ms", "")])), "wait()");
    }

    #[test]
    fn test_every_occurrence_is_replaced() {
        assert_eq!(resolve("{a}-{a}-{b}", &params(&[("a", "1"), ("b", "2")])), "1-1-2");
        assert_eq!(placeholders("{a}-{a}-{b}"), vec!["a", "a", "b"]);
        assert_eq!(unresolved_placeholders("{a}-{a}-{b}", &ParameterMap::new()), vec!["a", "b"]);
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let p = params(&[("a", "{b}"), ("b", "boom")]);
        assert_eq!(resolve("x {a}", &p), "x {b}");
    }

    #[test]
    fn test_resolution_is_pure() {
        let p = params(&[("sel", "#btn")]);
        let first = resolve("click {sel} {other}", &p);
        let second = resolve("click {sel} {other}", &p);
        assert_eq!(first, second);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_non_placeholder_braces_are_untouched() {
        let code = "function() { return {}; }";
        assert_eq!(resolve(code, &ParameterMap::new()), code);
        assert!(placeholders(code).is_empty());
    }

    #[test]
    fn test_argument_names_with_inner_spaces() {
        let code = "assert text == {expected text}";

        let report = resolve_with_report(code, &params(&[("expected text", "Welcome")]));
        assert_eq!(report.code, "assert text == Welcome");
        assert!(report.is_complete());

        let report = resolve_with_report(code, &ParameterMap::new());
        assert_eq!(report.code, code);
        assert_eq!(report.unresolved, vec!["expected text"]);
    }

    #[test]
    fn test_padded_braces_are_not_placeholders() {
        assert!(placeholders("if ok { retry() }").is_empty());
        assert_eq!(placeholders("{ a}{b }{a b}"), vec!["a b"]);
    }
}
