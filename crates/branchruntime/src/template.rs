//! `{{ namespace.field }}` interpolation.

use branchcore::{EvalError, Value, VariableSource};
use regex::Regex;
use std::sync::OnceLock;

fn span_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("template span pattern is valid"))
}

/// Replace every `{{ ref }}` span with the text of its resolved value.
///
/// Fails as a whole when any span fails; a partially substituted string is
/// never returned. Strings without `{{` come back unchanged.
pub fn interpolate(template: &str, vars: &dyn VariableSource) -> Result<String, EvalError> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in span_pattern().captures_iter(template) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        let value = vars.resolve(inner.as_str().trim())?;
        out.push_str(&value.to_text());
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Resolve the left-hand side of a clause.
///
/// A bare reference (`node.field`) or a field made of exactly one span
/// (`{{node.field}}`) keeps the resolved value's type. Anything else is
/// interpolated to text.
pub fn resolve_operand(field: &str, vars: &dyn VariableSource) -> Result<Value, EvalError> {
    let trimmed = field.trim();
    if !trimmed.contains("{{") {
        return vars.resolve(trimmed);
    }
    if let Some(reference) = single_span(trimmed) {
        return vars.resolve(reference);
    }
    interpolate(field, vars).map(Value::Text)
}

fn single_span(field: &str) -> Option<&str> {
    let caps = span_pattern().captures(field)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == field.len() {
        caps.get(1).map(|m| m.as_str().trim())
    } else {
        None
    }
}

/// References named by the spans of a template, in order of appearance.
pub fn extract_references(template: &str) -> Vec<String> {
    span_pattern()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// References used by a clause's left-hand field.
pub fn operand_references(field: &str) -> Vec<String> {
    let trimmed = field.trim();
    if trimmed.contains("{{") {
        extract_references(trimmed)
    } else if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::StaticVariables;
    use serde_json::json;

    fn vars() -> StaticVariables {
        StaticVariables::new()
            .with("input", Value::from(json!({"name": "Alice", "score": 5, "ok": true})))
            .with("llm", Value::from(json!({"text": "World", "tags": ["a", "b"], "meta": {"z": 1, "a": null}})))
    }

    #[test]
    fn test_interpolate_multiple_spans() {
        let result = interpolate("Hello {{input.name}}, says {{ llm.text }}", &vars()).unwrap();
        assert_eq!(result, "Hello Alice, says World");
    }

    #[test]
    fn test_stringification() {
        let vars = vars();
        assert_eq!(interpolate("{{input.score}}", &vars).unwrap(), "5");
        assert_eq!(interpolate("{{input.ok}}", &vars).unwrap(), "true");
        assert_eq!(interpolate("{{llm.tags}}", &vars).unwrap(), r#"["a","b"]"#);
        assert_eq!(interpolate("{{llm.meta}}", &vars).unwrap(), r#"{"a":null,"z":1}"#);
        assert_eq!(interpolate("[{{llm.missing}}]", &vars).unwrap(), "[]");
    }

    #[test]
    fn test_any_failing_span_fails_everything() {
        let err = interpolate("{{input.name}} and {{missing.field}}", &vars()).unwrap_err();
        assert!(matches!(err, EvalError::UnknownVariable { reference } if reference == "missing.field"));
    }

    #[test]
    fn test_plain_strings_are_untouched_and_idempotent() {
        let vars = vars();
        for s in ["plain text", "", "one { brace }", "}} reversed {"] {
            let once = interpolate(s, &vars).unwrap();
            assert_eq!(once, s);
            assert_eq!(interpolate(&once, &vars).unwrap(), once);
        }
    }

    #[test]
    fn test_non_greedy_spans() {
        let refs = extract_references("{{ a.b }}{{c}} and {{ d.e.f }}");
        assert_eq!(refs, vec!["a.b", "c", "d.e.f"]);
    }

    #[test]
    fn test_resolve_operand_keeps_type() {
        let vars = vars();
        assert_eq!(resolve_operand("input.score", &vars).unwrap(), Value::Number(5.0));
        assert_eq!(resolve_operand(" {{ llm.tags }} ", &vars).unwrap(), Value::from(json!(["a", "b"])));
        assert_eq!(
            resolve_operand("{{input.name}}-{{input.score}}", &vars).unwrap(),
            Value::from("Alice-5")
        );
    }

    #[test]
    fn test_operand_references() {
        assert_eq!(operand_references("ai_0.response"), vec!["ai_0.response"]);
        assert_eq!(operand_references("{{a.b}} {{c.d}}"), vec!["a.b", "c.d"]);
        assert!(operand_references("  ").is_empty());
    }
}
