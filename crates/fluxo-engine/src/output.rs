//! Final output resolution.

use serde_json::{json, Value};

use fluxo_core::ExecutionContext;

use crate::flow::{find_output_unit, FlowStep};

/// Resolve the flow's final output.
///
/// Order: if an output-marked unit exists and the context output was set,
/// that output wins; else the marked unit's entry in `globals`; else the
/// last non-null `globals` value in insertion order; else an empty object.
pub fn resolve_flow_output(steps: &[FlowStep], ctx: &ExecutionContext) -> Value {
    let output_unit = find_output_unit(steps);

    if output_unit.is_some() {
        if let Some(output) = &ctx.output {
            return output.clone();
        }
    }
    if let Some(unit) = output_unit {
        if let Some(result) = ctx.globals.get(&unit.name) {
            if !result.is_null() {
                return result.clone();
            }
        }
    }

    for (_, value) in ctx.globals.iter().rev() {
        if !value.is_null() {
            return value.clone();
        }
    }

    json!({})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowDefinition;

    fn marked_flow() -> FlowDefinition {
        FlowDefinition::from_value(json!({
            "name": "f",
            "middlewares": [
                {"type": "mapper", "name": "shape", "options": {"output": true}},
            ],
        }))
        .unwrap()
    }

    #[test]
    fn test_context_output_wins_when_marked() {
        let flow = marked_flow();
        let mut ctx = ExecutionContext::new(Value::Null);
        ctx.output = Some(json!({"explicit": true}));
        ctx.globals.insert("shape".to_string(), json!({"ignored": true}));
        assert_eq!(resolve_flow_output(&flow.steps, &ctx), json!({"explicit": true}));
    }

    #[test]
    fn test_marked_unit_globals_fallback() {
        let flow = marked_flow();
        let mut ctx = ExecutionContext::new(Value::Null);
        ctx.globals.insert("shape".to_string(), json!({"from": "globals"}));
        ctx.globals.insert("later".to_string(), json!({"not": "this"}));
        assert_eq!(resolve_flow_output(&flow.steps, &ctx), json!({"from": "globals"}));
    }

    #[test]
    fn test_last_non_null_global_fallback() {
        let flow = FlowDefinition::from_value(json!({
            "name": "f",
            "middlewares": [{"type": "mapper", "name": "a"}],
        }))
        .unwrap();
        let mut ctx = ExecutionContext::new(Value::Null);
        ctx.globals.insert("a".to_string(), json!(1));
        ctx.globals.insert("b".to_string(), json!(2));
        ctx.globals.insert("c".to_string(), Value::Null);
        assert_eq!(resolve_flow_output(&flow.steps, &ctx), json!(2));
    }

    #[test]
    fn test_empty_run_yields_empty_object() {
        let flow = FlowDefinition::from_value(json!({"name": "f", "middlewares": []})).unwrap();
        let ctx = ExecutionContext::new(Value::Null);
        assert_eq!(resolve_flow_output(&flow.steps, &ctx), json!({}));
    }
}
