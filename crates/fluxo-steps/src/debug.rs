//! Debug logging step.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use fluxo_core::{resolve_path, ExecutionContext, Step, StepError, StepValue, Tools};

/// Logs `options.message` and, when `options.select` names a path, the
/// selected value from the interpolation scope.
#[derive(Default)]
pub struct DebugStep;

impl DebugStep {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Step for DebugStep {
    fn name(&self) -> &str {
        "debug"
    }

    fn description(&self) -> &str {
        "Log a message and an optional context value"
    }

    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        options: &Value,
        _tools: &Tools,
    ) -> Result<StepValue, StepError> {
        let message = options
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("debug");
        let selected = options
            .get("select")
            .and_then(Value::as_str)
            .map(|path| {
                resolve_path(&ctx.interpolation_scope(), path)
                    .cloned()
                    .unwrap_or(Value::Null)
            });

        match &selected {
            Some(value) => info!(message, value = %value, "debug step"),
            None => info!(message, "debug step"),
        }

        Ok(StepValue::result(json!({
            "message": message,
            "value": selected,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logs_and_records_selection() {
        let mut ctx = ExecutionContext::new(json!({"body": {"user": "ada"}}));
        let value = DebugStep::new()
            .execute(
                &mut ctx,
                &json!({"message": "checkpoint", "select": "user"}),
                &Tools::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            value.result,
            Some(json!({"message": "checkpoint", "value": "ada"}))
        );
    }

    #[tokio::test]
    async fn test_defaults_without_options() {
        let mut ctx = ExecutionContext::new(Value::Null);
        let value = DebugStep::new()
            .execute(&mut ctx, &Value::Null, &Tools::new())
            .await
            .unwrap();
        assert_eq!(value.result, Some(json!({"message": "debug", "value": null})));
    }
}
