//! Step execution results.

use serde::Serialize;
use serde_json::Value;

/// What a successful step hands back to the engine.
///
/// `result` is stored under the step's name in `globals`; `output` replaces
/// the context output when present; `metadata` is stored under
/// `globals["{name}-metadata"]` so later steps can interpolate it; `meta` is
/// attached to the trace entry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl StepValue {
    /// A success with nothing to record.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A success whose result lands in `globals`.
    pub fn result(value: Value) -> Self {
        Self {
            result: Some(value),
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}
