//! Step trait and registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::StepError;
use crate::result::StepValue;

/// A function usable from mapper `fn` entries.
pub type MapperFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Shared collaborators handed to every step invocation.
#[derive(Clone, Default)]
pub struct Tools {
    functions: HashMap<String, MapperFn>,
}

impl Tools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `name` for mapper `fn` calls.
    pub fn register_function<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    pub fn function(&self, name: &str) -> Option<&MapperFn> {
        self.functions.get(name)
    }
}

impl fmt::Debug for Tools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tools")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A leaf work unit the engine can dispatch to.
#[async_trait]
pub trait Step: Send + Sync {
    /// Registry key, matched against the unit's `type` field.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Whether the engine should interpolate options before invoking.
    ///
    /// Steps that interpolate internally (mapper) return false so values
    /// are not substituted twice.
    fn interpolates_options(&self) -> bool {
        true
    }

    /// Execute against the current context with already-interpolated
    /// options (unless this step opted out).
    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        options: &Value,
        tools: &Tools,
    ) -> Result<StepValue, StepError>;
}

/// Registry mapping step type names to implementations.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: Step + 'static>(&mut self, step: S) {
        self.steps.insert(step.name().to_string(), Arc::new(step));
    }

    pub fn register_arc(&mut self, step: Arc<dyn Step>) {
        self.steps.insert(step.name().to_string(), step);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.steps.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoStep;

    #[async_trait]
    impl Step for EchoStep {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(
            &self,
            _ctx: &mut ExecutionContext,
            options: &Value,
            _tools: &Tools,
        ) -> Result<StepValue, StepError> {
            Ok(StepValue::result(options.clone()))
        }
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let mut registry = StepRegistry::new();
        registry.register(EchoStep);
        assert!(registry.contains("echo"));
        assert!(registry.get("missing").is_none());

        let step = registry.get("echo").unwrap();
        let mut ctx = ExecutionContext::new(Value::Null);
        let value = step
            .execute(&mut ctx, &json!({"x": 1}), &Tools::new())
            .await
            .unwrap();
        assert_eq!(value.result, Some(json!({"x": 1})));
    }

    #[test]
    fn test_tools_function_registry() {
        let mut tools = Tools::new();
        tools.register_function("upper", |args| {
            let s = args.first().and_then(Value::as_str).unwrap_or("");
            Value::String(s.to_uppercase())
        });

        let f = tools.function("upper").unwrap();
        assert_eq!(f(&[json!("ada")]), json!("ADA"));
        assert!(tools.function("missing").is_none());
    }
}
