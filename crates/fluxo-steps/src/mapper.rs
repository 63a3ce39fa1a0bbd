//! Data shaping between context origins.
//!
//! The mapper interpolates internally, so it opts out of engine
//! pre-interpolation; otherwise `{{...}}` values inside mapping items would
//! be substituted twice.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::error;

use fluxo_core::{
    interpolate_str, resolve_path, ExecutionContext, Step, StepError, StepValue, Tools,
};

/// Mapping entries look like
/// `{ "to": "user.name", "from": "body.firstName", "origin": "body" }`,
/// with `fn` and `value` as alternatives to `from` (precedence
/// `fn` > `value` > `from`).
#[derive(Default)]
pub struct MapperStep;

impl MapperStep {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Step for MapperStep {
    fn name(&self) -> &str {
        "mapper"
    }

    fn description(&self) -> &str {
        "Shape data between context origins with dot-path mappings"
    }

    fn interpolates_options(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        options: &Value,
        tools: &Tools,
    ) -> Result<StepValue, StepError> {
        let mapping = options.get("mapping").unwrap_or(options);
        let mut result = Value::Object(Map::new());

        match mapping {
            Value::Array(items) => {
                for item in items {
                    apply_item(item, ctx, tools, &mut result);
                }
            }
            Value::Object(entries) => {
                // Legacy object form: { "source.path": "targetKey" }.
                for (from, to) in entries {
                    apply_object_entry(from, to, ctx, tools, &mut result);
                }
            }
            _ => return Err(StepError::Options("mapper needs a mapping array".into())),
        }

        let is_empty = result
            .as_object()
            .map(|m| m.is_empty())
            .unwrap_or(true);
        if is_empty {
            return Ok(StepValue::empty());
        }

        if options.get("output").and_then(Value::as_bool) == Some(true) {
            Ok(StepValue::empty().with_output(result))
        } else {
            Ok(StepValue::result(result))
        }
    }
}

fn apply_item(item: &Value, ctx: &ExecutionContext, tools: &Tools, result: &mut Value) {
    let Some(to) = item.get("to").and_then(Value::as_str) else {
        error!(item = %item, "mapping item has no 'to' path");
        return;
    };

    let value = if let Some(call) = item.get("fn").and_then(Value::as_str) {
        call_function(call, ctx, tools)
    } else if let Some(map) = item.as_object() {
        if map.contains_key("value") {
            map.get("value").cloned()
        } else {
            resolve_from(item, ctx)
        }
    } else {
        None
    };

    if let Some(value) = value {
        set_by_path(result, to, value);
    }
}

fn apply_object_entry(from: &str, to: &Value, ctx: &ExecutionContext, tools: &Tools, result: &mut Value) {
    let mut value = resolve_path(&ctx.input, from).cloned();
    if value.is_none() {
        let globals = Value::Object(
            ctx.globals
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        value = resolve_path(&globals, from).cloned();
    }

    match to {
        Value::String(key) => {
            if let Some(value) = value {
                set_by_path(result, key, value);
            }
        }
        Value::Object(spec) => {
            let Some(fn_name) = spec.get("fn").and_then(Value::as_str) else {
                return;
            };
            match tools.function(fn_name) {
                Some(f) => {
                    let transformed = f(&[value.unwrap_or(Value::Null)]);
                    if let Some(key) = spec.get("to").and_then(Value::as_str) {
                        set_by_path(result, key, transformed);
                    }
                }
                None => error!(function = fn_name, "function not found in registry"),
            }
        }
        _ => {}
    }
}

fn resolve_from(item: &Value, ctx: &ExecutionContext) -> Option<Value> {
    let from = item.get("from").and_then(Value::as_str)?;
    let origin = item.get("origin").and_then(Value::as_str);
    let source = resolve_origin(origin, ctx);
    if from == "*" {
        return Some(source);
    }
    resolve_path(&source, from).cloned()
}

fn resolve_origin(origin: Option<&str>, ctx: &ExecutionContext) -> Value {
    match origin.unwrap_or("body") {
        "input" => ctx.input.clone(),
        "output" => ctx.output.clone().unwrap_or(Value::Null),
        "globals" => Value::Object(
            ctx.globals
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        "headers" => ctx.input.get("headers").cloned().unwrap_or(Value::Null),
        "pathParameters" => ctx
            .input
            .get("pathParameters")
            .cloned()
            .unwrap_or(Value::Null),
        "queryStringParameters" => ctx
            .input
            .get("queryStringParameters")
            .cloned()
            .unwrap_or(Value::Null),
        _ => ctx.input.get("body").cloned().unwrap_or(Value::Null),
    }
}

/// Evaluate a `fn` entry: `name(arg, ...)` against the function registry,
/// or fall back to interpolation for anything that does not look like a
/// call.
fn call_function(call: &str, ctx: &ExecutionContext, tools: &Tools) -> Option<Value> {
    static CALL_RE: OnceLock<Regex> = OnceLock::new();
    let re = CALL_RE.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9_]+)(?:\((.*)\))?$").expect("static regex")
    });

    let scope = ctx.interpolation_scope();
    let Some(captures) = re.captures(call.trim()) else {
        return Some(interpolate_str(call, &scope));
    };

    let fn_name = &captures[1];
    let Some(f) = tools.function(fn_name) else {
        error!(function = fn_name, "function not found in registry");
        return None;
    };

    let args: Vec<Value> = captures
        .get(2)
        .map(|raw| {
            raw.as_str()
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|arg| parse_arg(arg.trim(), &scope))
                .collect()
        })
        .unwrap_or_default();

    Some(f(&args))
}

fn parse_arg(arg: &str, scope: &Value) -> Value {
    if arg.contains("{{") && arg.contains("}}") {
        return interpolate_str(arg, scope);
    }
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Value::String(arg[1..arg.len() - 1].to_string());
        }
    }
    // Long digit strings (card numbers) stay strings.
    if arg.len() < 10 {
        if let Ok(n) = arg.parse::<f64>() {
            if let Some(n) = serde_json::Number::from_f64(n) {
                return Value::Number(n);
            }
        }
    }
    Value::String(arg.to_string())
}

/// Write `value` at a dot path, creating intermediate objects, or arrays
/// when the next segment is numeric.
fn set_by_path(target: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = target;

    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;
        let next_is_index = segments
            .get(i + 1)
            .map(|s| s.parse::<usize>().is_ok())
            .unwrap_or(false);

        if let Ok(index) = segment.parse::<usize>() {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let Value::Array(items) = current else { return };
            while items.len() <= index {
                items.push(Value::Null);
            }
            if last {
                items[index] = value;
                return;
            }
            ensure_container(&mut items[index], next_is_index);
            current = &mut items[index];
        } else {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else { return };
            if last {
                map.insert(segment.to_string(), value);
                return;
            }
            let slot = map.entry(segment.to_string()).or_insert(Value::Null);
            ensure_container(slot, next_is_index);
            current = slot;
        }
    }
}

fn ensure_container(slot: &mut Value, array: bool) {
    if array {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
    } else if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(json!({
            "body": {"firstName": "Ada", "lastName": "Lovelace", "amount": 120},
            "headers": {"x-trace": "abc"},
            "pathParameters": {"userId": "42"},
        }));
        ctx.globals.insert("lookup".to_string(), json!({"score": 7}));
        ctx
    }

    async fn run_mapper(ctx: &mut ExecutionContext, options: Value, tools: &Tools) -> StepValue {
        MapperStep::new()
            .execute(ctx, &options, tools)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_from_mapping_with_origins() {
        let mut ctx = ctx();
        let value = run_mapper(
            &mut ctx,
            json!({"mapping": [
                {"to": "name", "from": "firstName"},
                {"to": "trace", "from": "x-trace", "origin": "headers"},
                {"to": "id", "from": "userId", "origin": "pathParameters"},
                {"to": "score", "from": "lookup.score", "origin": "globals"},
            ]}),
            &Tools::new(),
        )
        .await;

        assert_eq!(
            value.result,
            Some(json!({"name": "Ada", "trace": "abc", "id": "42", "score": 7}))
        );
    }

    #[tokio::test]
    async fn test_value_and_wildcard() {
        let mut ctx = ctx();
        let value = run_mapper(
            &mut ctx,
            json!({"mapping": [
                {"to": "static", "value": {"fixed": true}},
                {"to": "explicitNull", "value": null},
                {"to": "everything", "from": "*"},
            ]}),
            &Tools::new(),
        )
        .await;

        let result = value.result.unwrap();
        assert_eq!(result["static"], json!({"fixed": true}));
        // `value: null` is still an explicit value
        assert_eq!(result["explicitNull"], Value::Null);
        assert_eq!(result["everything"]["firstName"], json!("Ada"));
    }

    #[tokio::test]
    async fn test_fn_precedence_and_interpolated_args() {
        let mut ctx = ctx();
        let mut tools = Tools::new();
        tools.register_function("concat", |args| {
            let joined = args
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(" ");
            Value::String(joined)
        });

        let value = run_mapper(
            &mut ctx,
            json!({"mapping": [
                // fn wins even though from is present
                {"to": "full", "fn": "concat({{firstName}}, {{lastName}})", "from": "firstName"},
            ]}),
            &tools,
        )
        .await;

        assert_eq!(value.result.unwrap()["full"], json!("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_missing_fn_skips_entry() {
        let mut ctx = ctx();
        let value = run_mapper(
            &mut ctx,
            json!({"mapping": [
                {"to": "gone", "fn": "nope()"},
                {"to": "kept", "value": 1},
            ]}),
            &Tools::new(),
        )
        .await;

        let result = value.result.unwrap();
        assert!(result.get("gone").is_none());
        assert_eq!(result["kept"], json!(1));
    }

    #[tokio::test]
    async fn test_set_by_path_builds_arrays() {
        let mut ctx = ctx();
        let value = run_mapper(
            &mut ctx,
            json!({"mapping": [
                {"to": "items.0.name", "value": "first"},
                {"to": "items.2.name", "value": "third"},
                {"to": "meta.nested.deep", "value": true},
            ]}),
            &Tools::new(),
        )
        .await;

        assert_eq!(
            value.result,
            Some(json!({
                "items": [{"name": "first"}, null, {"name": "third"}],
                "meta": {"nested": {"deep": true}},
            }))
        );
    }

    #[tokio::test]
    async fn test_output_flag_routes_to_output() {
        let mut ctx = ctx();
        let value = run_mapper(
            &mut ctx,
            json!({"output": true, "mapping": [{"to": "done", "value": true}]}),
            &Tools::new(),
        )
        .await;

        assert!(value.result.is_none());
        assert_eq!(value.output, Some(json!({"done": true})));
    }

    #[tokio::test]
    async fn test_empty_result_records_nothing() {
        let mut ctx = ctx();
        let value = run_mapper(
            &mut ctx,
            json!({"mapping": [{"to": "missing", "from": "does.not.exist"}]}),
            &Tools::new(),
        )
        .await;

        assert!(value.result.is_none());
        assert!(value.output.is_none());
    }
}
