//! JSON Schema validation of a context origin.

use async_trait::async_trait;
use serde_json::{json, Value};

use fluxo_core::{ExecutionContext, Step, StepError, StepValue, Tools};

/// Validates data selected by `options.origin` against `options.schema`.
///
/// On success the validated data becomes the context output unless
/// `options.output` is explicitly false. On failure the step raises a
/// `ValidationError` carrying the validator's error list.
#[derive(Default)]
pub struct ValidatorStep;

impl ValidatorStep {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Step for ValidatorStep {
    fn name(&self) -> &str {
        "validator"
    }

    fn description(&self) -> &str {
        "Validate a context origin against a JSON Schema"
    }

    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        options: &Value,
        _tools: &Tools,
    ) -> Result<StepValue, StepError> {
        let schema = options
            .get("schema")
            .ok_or_else(|| StepError::Options("validator requires a schema in options".into()))?;
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| StepError::Options(format!("invalid schema: {}", e)))?;

        let data = select_origin(options, ctx);
        let errors: Vec<Value> = validator
            .iter_errors(&data)
            .map(|e| {
                json!({
                    "instancePath": e.instance_path.to_string(),
                    "message": e.to_string(),
                })
            })
            .collect();

        if !errors.is_empty() {
            let on_error = options.get("onError").unwrap_or(&Value::Null);
            return Err(StepError::Validation {
                message: on_error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Validation failed")
                    .to_string(),
                code: on_error
                    .get("code")
                    .and_then(Value::as_u64)
                    .unwrap_or(400) as u16,
                errors,
            });
        }

        if options.get("output").and_then(Value::as_bool) == Some(false) {
            Ok(StepValue::empty())
        } else {
            Ok(StepValue::empty().with_output(data))
        }
    }
}

fn select_origin(options: &Value, ctx: &ExecutionContext) -> Value {
    let origin = options
        .get("origin")
        .and_then(Value::as_str)
        .unwrap_or("input");
    match origin {
        "output" => ctx.output.clone().unwrap_or(Value::Null),
        "globals" => Value::Object(
            ctx.globals
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        "body" => ctx.input.get("body").cloned().unwrap_or(Value::Null),
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
        "custom" => options.get("data").cloned().unwrap_or(Value::Null),
        _ => ctx.input.clone(),
    }
}
