//! Step execution error types.

use serde_json::{json, Value};
use thiserror::Error;

/// Errors raised by step implementations.
///
/// Every variant maps to a stable error type tag through [`StepError::error_type`].
/// Retry policies match their allowlists against that tag.
#[derive(Debug, Error)]
pub enum StepError {
    /// Schema validation failed.
    #[error("{message}")]
    Validation {
        message: String,
        code: u16,
        errors: Vec<Value>,
    },

    /// HTTP request failed or returned a non-success status.
    #[error("{message}")]
    Http {
        message: String,
        status: Option<u16>,
    },

    /// The step options are malformed or incomplete.
    #[error("invalid step options: {0}")]
    Options(String),

    /// Generic failure with a caller-chosen error type tag.
    #[error("{message}")]
    Failure { error_type: String, message: String },
}

impl StepError {
    /// Failure with an explicit error type tag.
    pub fn failure(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        StepError::Failure {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Stable classification tag for error reports and retry allowlists.
    pub fn error_type(&self) -> &str {
        match self {
            StepError::Validation { .. } => "ValidationError",
            StepError::Http { .. } => "HttpError",
            StepError::Options(_) => "ConfigurationError",
            StepError::Failure { error_type, .. } => error_type,
        }
    }

    /// Structured detail payload for validation failures.
    pub fn validation_details(&self) -> Option<Value> {
        match self {
            StepError::Validation {
                message,
                code,
                errors,
            } => Some(json!({
                "type": "ValidationError",
                "message": message,
                "code": code,
                "errors": errors,
            })),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StepError {
    fn from(e: serde_json::Error) -> Self {
        StepError::Options(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_tags() {
        let err = StepError::Validation {
            message: "bad payload".to_string(),
            code: 400,
            errors: vec![],
        };
        assert_eq!(err.error_type(), "ValidationError");

        let err = StepError::failure("TransientError", "upstream hiccup");
        assert_eq!(err.error_type(), "TransientError");
        assert_eq!(err.to_string(), "upstream hiccup");
    }

    #[test]
    fn test_validation_details() {
        let err = StepError::Validation {
            message: "Validation failed".to_string(),
            code: 400,
            errors: vec![json!({"instancePath": "/age", "message": "not a number"})],
        };
        let details = err.validation_details().unwrap();
        assert_eq!(details["code"], 400);
        assert_eq!(details["errors"][0]["instancePath"], "/age");

        assert!(StepError::Options("missing url".into())
            .validation_details()
            .is_none());
    }
}
