//! Flow definition model and wire-format compilation.
//!
//! Flows arrive as JSON: `{ "name": ..., "middlewares": [...] }`. Each node
//! is routed by shape: a `sequence` / `parallel` / `conditional` key selects
//! the combinator, a bare array is an implicit sequence, a `type` key marks a
//! unit `{ "type", "name", "options" }`. Units with `type: "retry"` are
//! lifted into the dedicated [`FlowStep::Retry`] variant at compile time so
//! the interpreter dispatches on the closed sum type alone; string-keyed
//! lookup only happens at the unit boundary, against the step registry.

use serde::Deserialize;
use serde_json::Value;

use crate::error::EngineError;

/// A leaf work unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSpec {
    pub step_type: String,
    pub name: String,
    pub options: Value,
}

impl UnitSpec {
    /// Whether this unit is marked as the flow output.
    pub fn is_output(&self) -> bool {
        self.options.get("output").and_then(Value::as_bool) == Some(true)
    }

    /// Whether a failure of this unit aborts the flow. Defaults to true;
    /// only an explicit `blocking: false` opts out.
    pub fn is_blocking(&self) -> bool {
        self.options.get("blocking").and_then(Value::as_bool) != Some(false)
    }
}

/// Backoff policy of a retry node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(rename = "interval", default = "default_interval")]
    pub base_interval_seconds: f64,
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
    #[serde(default)]
    pub jitter: f64,
    /// Error type tags that may be retried. Empty means every type is.
    #[serde(rename = "errors", default)]
    pub retryable_error_types: Vec<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_interval() -> f64 {
    1.0
}

fn default_backoff_rate() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_interval_seconds: default_interval(),
            backoff_rate: default_backoff_rate(),
            jitter: 0.0,
            retryable_error_types: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Base wait before the attempt following `attempt` (1-based), without
    /// jitter: `interval * rate^(attempt - 1)`.
    pub fn wait_seconds(&self, attempt: u32) -> f64 {
        self.base_interval_seconds * self.backoff_rate.powi(attempt.saturating_sub(1) as i32)
    }

    /// Whether a failure with this tag may be retried.
    pub fn is_retryable(&self, error_type: &str) -> bool {
        self.retryable_error_types.is_empty()
            || self.retryable_error_types.iter().any(|t| t == error_type)
    }
}

/// A retry node wrapping an inner step.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySpec {
    pub name: String,
    pub inner: Box<FlowStep>,
    pub policy: RetryPolicy,
}

/// Compiled flow node.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    Unit(UnitSpec),
    Sequence(Vec<FlowStep>),
    Parallel(Vec<FlowStep>),
    Conditional {
        expression: String,
        then: Box<FlowStep>,
        otherwise: Option<Box<FlowStep>>,
    },
    Retry(RetrySpec),
}

/// A parsed, ready-to-run flow.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    pub name: String,
    pub steps: Vec<FlowStep>,
}

impl FlowDefinition {
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        let doc: FlowDocument =
            serde_json::from_value(value).map_err(|e| EngineError::InvalidFlow(e.to_string()))?;
        let steps = doc
            .middlewares
            .into_iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: doc.name,
            steps,
        })
    }

    pub fn from_str(source: &str) -> Result<Self, EngineError> {
        let value: Value =
            serde_json::from_str(source).map_err(|e| EngineError::InvalidFlow(e.to_string()))?;
        Self::from_value(value)
    }
}

#[derive(Debug, Deserialize)]
struct FlowDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    middlewares: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ConditionalNode {
    /// The expression lives under `if` or `condition`.
    #[serde(alias = "if")]
    condition: String,
    then: Value,
    #[serde(rename = "else")]
    otherwise: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UnitNode {
    #[serde(rename = "type")]
    step_type: String,
    name: Option<String>,
    options: Option<Value>,
}

/// Options of a `type: "retry"` unit.
#[derive(Debug, Deserialize)]
struct RetryOptions {
    step: Value,
    #[serde(flatten)]
    policy: RetryPolicy,
}

/// Routes a wire node by shape. Anything unrecognized is rejected with an
/// error quoting the offending fragment.
fn compile(node: Value) -> Result<FlowStep, EngineError> {
    match node {
        // Bare arrays are implicit sequences.
        Value::Array(children) => Ok(FlowStep::Sequence(compile_all(children)?)),
        Value::Object(mut map) => {
            if let Some(children) = map.remove("sequence") {
                Ok(FlowStep::Sequence(compile_all(node_list("sequence", children)?)?))
            } else if let Some(children) = map.remove("parallel") {
                Ok(FlowStep::Parallel(compile_all(node_list("parallel", children)?)?))
            } else if let Some(conditional) = map.remove("conditional") {
                compile_conditional(conditional)
            } else if map.contains_key("type") {
                let unit: UnitNode = serde_json::from_value(Value::Object(map))
                    .map_err(|e| EngineError::InvalidFlow(format!("invalid unit node: {}", e)))?;
                if unit.step_type == "retry" {
                    compile_retry(unit)
                } else {
                    let name = unit.name.unwrap_or_else(|| unit.step_type.clone());
                    Ok(FlowStep::Unit(UnitSpec {
                        step_type: unit.step_type,
                        name,
                        options: unit.options.unwrap_or(Value::Null),
                    }))
                }
            } else {
                Err(unrecognized_node(&Value::Object(map)))
            }
        }
        other => Err(unrecognized_node(&other)),
    }
}

fn unrecognized_node(node: &Value) -> EngineError {
    EngineError::InvalidFlow(format!("unrecognized flow node: {}", node))
}

fn node_list(key: &str, value: Value) -> Result<Vec<Value>, EngineError> {
    match value {
        Value::Array(children) => Ok(children),
        other => Err(EngineError::InvalidFlow(format!(
            "'{}' must hold an array of nodes, got: {}",
            key, other
        ))),
    }
}

fn compile_conditional(node: Value) -> Result<FlowStep, EngineError> {
    let spec: ConditionalNode = serde_json::from_value(node)
        .map_err(|e| EngineError::InvalidFlow(format!("invalid conditional node: {}", e)))?;
    Ok(FlowStep::Conditional {
        expression: spec.condition,
        then: Box::new(compile(spec.then)?),
        otherwise: spec.otherwise.map(compile).transpose()?.map(Box::new),
    })
}

fn compile_all(nodes: Vec<Value>) -> Result<Vec<FlowStep>, EngineError> {
    nodes.into_iter().map(compile).collect()
}

fn compile_retry(unit: UnitNode) -> Result<FlowStep, EngineError> {
    let name = unit.name.unwrap_or_else(|| "retry".to_string());
    let options = unit.options.ok_or_else(|| {
        EngineError::InvalidFlow(format!("retry unit '{}' has no options", name))
    })?;
    let opts: RetryOptions = serde_json::from_value(options).map_err(|e| {
        EngineError::InvalidFlow(format!("retry unit '{}' options are invalid: {}", name, e))
    })?;
    Ok(FlowStep::Retry(RetrySpec {
        name,
        inner: Box::new(compile(opts.step)?),
        policy: opts.policy,
    }))
}

/// Depth-first search for the first unit marked `output: true`, descending
/// into every combinator child including both conditional branches.
pub fn find_output_unit(steps: &[FlowStep]) -> Option<&UnitSpec> {
    for step in steps {
        if let Some(unit) = find_in_step(step) {
            return Some(unit);
        }
    }
    None
}

fn find_in_step(step: &FlowStep) -> Option<&UnitSpec> {
    match step {
        FlowStep::Unit(unit) => unit.is_output().then_some(unit),
        FlowStep::Sequence(children) | FlowStep::Parallel(children) => find_output_unit(children),
        FlowStep::Conditional {
            then, otherwise, ..
        } => find_in_step(then).or_else(|| otherwise.as_deref().and_then(find_in_step)),
        FlowStep::Retry(spec) => find_in_step(&spec.inner),
    }
}
