//! Engine error types.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Why a retry node gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryFailureReason {
    NotRetryable,
    MaxAttemptsReached,
}

/// Attached to a step failure that surfaced through a retry node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryContext {
    pub attempts_executed: u32,
    pub max_attempts: u32,
    pub reason: RetryFailureReason,
}

/// Errors that abort a flow run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The flow definition does not compile.
    #[error("invalid flow definition: {0}")]
    InvalidFlow(String),

    /// A unit references a step type nobody registered. Always fatal,
    /// never downgraded by `blocking: false` and never retried.
    #[error("step type '{step_type}' is not registered (step '{step_name}')")]
    UnknownStepType {
        step_name: String,
        step_type: String,
    },

    /// A blocking step failed.
    #[error("step '{step_name}' [{step_type}] failed: {message}")]
    StepFailed {
        step_name: String,
        step_type: String,
        error_type: String,
        message: String,
        validation_details: Option<Value>,
        retry_context: Option<RetryContext>,
    },
}

impl EngineError {
    /// Classification tag used by retry allowlists.
    pub fn error_type(&self) -> &str {
        match self {
            EngineError::InvalidFlow(_) | EngineError::UnknownStepType { .. } => {
                "ConfigurationError"
            }
            EngineError::StepFailed { error_type, .. } => error_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_classification() {
        let err = EngineError::UnknownStepType {
            step_name: "lookup".to_string(),
            step_type: "sql".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "step type 'sql' is not registered (step 'lookup')"
        );
        assert_eq!(err.error_type(), "ConfigurationError");

        let err = EngineError::StepFailed {
            step_name: "fetch".to_string(),
            step_type: "http_request".to_string(),
            error_type: "HttpError".to_string(),
            message: "502 Bad Gateway".to_string(),
            validation_details: None,
            retry_context: None,
        };
        assert_eq!(err.error_type(), "HttpError");
    }
}
