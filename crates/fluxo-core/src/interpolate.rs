//! `{{path}}` interpolation over JSON scopes.
//!
//! Paths are dot-separated and navigate objects by key and arrays by index.
//! A string that is a single `{{path}}` reference resolves to the referenced
//! value itself, so whole objects can flow through options. Anything else is
//! substituted textually; unresolved references become the string `null`.
//! Interpolation never fails.

use serde_json::Value;
use tracing::debug;

/// Navigate `scope` by a dot-separated path. Missing segments yield `None`.
pub fn resolve_path<'a>(scope: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = scope;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Interpolate a single string against `scope`.
///
/// A full-reference string (`{{a.b}}` and nothing else) returns the resolved
/// value, or `Value::Null` when the path is missing. Otherwise every
/// `{{path}}` occurrence is replaced with its stringified value.
pub fn interpolate_str(input: &str, scope: &Value) -> Value {
    if let Some(path) = full_reference(input) {
        return match resolve_path(scope, path) {
            Some(v) => v.clone(),
            None => {
                debug!(path, "interpolation path not found");
                Value::Null
            }
        };
    }

    if !input.contains("{{") {
        return Value::String(input.to_string());
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                match resolve_path(scope, path) {
                    Some(v) => out.push_str(&stringify(v)),
                    None => out.push_str("null"),
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated reference, keep the braces verbatim.
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

/// Recursively interpolate every string inside `value`.
pub fn deep_interpolate(value: &Value, scope: &Value) -> Value {
    match value {
        Value::String(s) => interpolate_str(s, scope),
        Value::Array(items) => Value::Array(items.iter().map(|v| deep_interpolate(v, scope)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), deep_interpolate(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Returns the inner path when the whole string is one `{{path}}` reference.
fn full_reference(input: &str) -> Option<&str> {
    let inner = input.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains('{') || inner.contains('}') {
        return None;
    }
    Some(inner.trim())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Value {
        json!({
            "user": {"name": "ada", "age": 36},
            "items": [{"id": 7}, {"id": 9}],
            "flag": true,
            "nothing": null,
        })
    }

    #[test]
    fn test_resolve_path() {
        let s = scope();
        assert_eq!(resolve_path(&s, "user.name"), Some(&json!("ada")));
        assert_eq!(resolve_path(&s, "items.1.id"), Some(&json!(9)));
        assert_eq!(resolve_path(&s, "user.missing"), None);
        assert_eq!(resolve_path(&s, "items.x"), None);
    }

    #[test]
    fn test_full_reference_returns_value() {
        let s = scope();
        assert_eq!(interpolate_str("{{user}}", &s), json!({"name": "ada", "age": 36}));
        assert_eq!(interpolate_str("{{flag}}", &s), json!(true));
        assert_eq!(interpolate_str("{{user.missing}}", &s), Value::Null);
    }

    #[test]
    fn test_partial_interpolation_stringifies() {
        let s = scope();
        assert_eq!(
            interpolate_str("hello {{user.name}}, you are {{user.age}}", &s),
            json!("hello ada, you are 36")
        );
        assert_eq!(interpolate_str("x={{gone}}", &s), json!("x=null"));
        assert_eq!(
            interpolate_str("items: {{items}}", &s),
            json!("items: [{\"id\":7},{\"id\":9}]")
        );
    }

    #[test]
    fn test_no_references_passthrough() {
        let s = scope();
        assert_eq!(interpolate_str("plain text", &s), json!("plain text"));
        assert_eq!(interpolate_str("open {{ but never closed", &s), json!("open {{ but never closed"));
    }

    #[test]
    fn test_deep_interpolate() {
        let s = scope();
        let options = json!({
            "greeting": "hi {{user.name}}",
            "payload": {"user": "{{user}}"},
            "list": ["{{flag}}", 1],
        });
        assert_eq!(
            deep_interpolate(&options, &s),
            json!({
                "greeting": "hi ada",
                "payload": {"user": {"name": "ada", "age": 36}},
                "list": [true, 1],
            })
        );
    }
}
