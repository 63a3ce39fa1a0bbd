//! Flow execution context.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::trace::TraceHandle;

/// A step failure that did not abort the flow (`blocking: false`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonBlockingError {
    pub step_name: String,
    pub step_type: String,
    pub error_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state threaded through a flow run.
///
/// `globals` is insertion ordered so the "last written non-null result"
/// output fallback is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Request payload. Read-only by convention; may carry `body`,
    /// `headers`, `pathParameters`, `queryStringParameters` and `env`.
    pub input: Value,
    /// Step name -> step result.
    pub globals: IndexMap<String, Value>,
    /// Explicit final output candidate, set by output-marked steps.
    pub output: Option<Value>,
    /// Failures collected from non-blocking steps.
    pub non_blocking_errors: Vec<NonBlockingError>,
    /// Shared trace recorder.
    pub trace: TraceHandle,
}

impl ExecutionContext {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }

    /// Isolated copy for a parallel branch: globals and output are cloned,
    /// the trace recorder stays shared.
    pub fn fork(&self) -> Self {
        Self {
            input: self.input.clone(),
            globals: self.globals.clone(),
            output: self.output.clone(),
            non_blocking_errors: Vec::new(),
            trace: self.trace.clone(),
        }
    }

    /// Fold a finished branch back in. Branch globals overwrite per key,
    /// branch output shallow-merges into an object output (or replaces a
    /// non-object one), and collected non-blocking errors are appended.
    pub fn merge_branch(&mut self, branch: ExecutionContext) {
        for (name, value) in branch.globals {
            self.globals.insert(name, value);
        }
        if let Some(branch_output) = branch.output {
            match (&mut self.output, branch_output) {
                (Some(Value::Object(parent)), Value::Object(from_branch)) => {
                    parent.extend(from_branch);
                }
                (slot, branch_output) => *slot = Some(branch_output),
            }
        }
        self.non_blocking_errors.extend(branch.non_blocking_errors);
    }

    /// Store a step result under its name.
    pub fn record_result(&mut self, name: impl Into<String>, result: Value) {
        self.globals.insert(name.into(), result);
    }

    /// Merged view interpolation resolves against. Later spreads shadow
    /// earlier ones: globals, input fields, `env`, `input.body` fields,
    /// `input.pathParameters` fields.
    pub fn interpolation_scope(&self) -> Value {
        let mut scope = Map::new();
        for (name, value) in &self.globals {
            scope.insert(name.clone(), value.clone());
        }
        if let Value::Object(input) = &self.input {
            for (key, value) in input {
                scope.insert(key.clone(), value.clone());
            }
        }
        let env = match self.input.get("env") {
            Some(env) => env.clone(),
            None => Value::Object(
                std::env::vars()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ),
        };
        scope.insert("env".to_string(), env);
        if let Some(Value::Object(body)) = self.input.get("body") {
            for (key, value) in body {
                scope.insert(key.clone(), value.clone());
            }
        }
        if let Some(Value::Object(params)) = self.input.get("pathParameters") {
            for (key, value) in params {
                scope.insert(key.clone(), value.clone());
            }
        }
        Value::Object(scope)
    }
}
