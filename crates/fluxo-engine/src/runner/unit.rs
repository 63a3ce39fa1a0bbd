//! Leaf unit execution: registry lookup, option interpolation, result
//! recording and the blocking/non-blocking failure split.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, warn};

use fluxo_core::{
    deep_interpolate, ExecutionContext, NonBlockingError, TraceId, TraceKind, TraceStatus,
};

use crate::error::EngineError;
use crate::flow::UnitSpec;
use crate::orchestrator::Orchestrator;

pub(crate) async fn run(
    orch: &Orchestrator,
    ctx: &mut ExecutionContext,
    spec: &UnitSpec,
    parent: Option<TraceId>,
) -> Result<(), EngineError> {
    let entry = ctx.trace.open(&spec.name, TraceKind::Step, parent);

    let Some(step) = orch.registry().get(&spec.step_type) else {
        let err = EngineError::UnknownStepType {
            step_name: spec.name.clone(),
            step_type: spec.step_type.clone(),
        };
        ctx.trace
            .close_with_meta(entry, TraceStatus::Failed, json!({"error": err.to_string()}));
        error!(step = %spec.name, step_type = %spec.step_type, "unknown step type");
        // Configuration errors are fatal regardless of the blocking flag.
        return Err(err);
    };

    let options = if step.interpolates_options() {
        deep_interpolate(&spec.options, &ctx.interpolation_scope())
    } else {
        spec.options.clone()
    };

    debug!(step = %spec.name, step_type = %spec.step_type, "executing step");
    match step.execute(ctx, &options, orch.tools()).await {
        Ok(value) => {
            if let Some(result) = value.result {
                ctx.record_result(spec.name.clone(), result);
            }
            if let Some(metadata) = value.metadata {
                ctx.record_result(format!("{}-metadata", spec.name), metadata);
            }
            if let Some(output) = value.output {
                ctx.output = Some(output);
            }
            match value.meta {
                Some(meta) => ctx.trace.close_with_meta(entry, TraceStatus::Success, meta),
                None => ctx.trace.close(entry, TraceStatus::Success),
            }
            Ok(())
        }
        Err(err) => {
            let error_type = err.error_type().to_string();
            let message = err.to_string();
            ctx.trace.close_with_meta(
                entry,
                TraceStatus::Failed,
                json!({"error": message, "errorType": error_type}),
            );

            if spec.is_blocking() {
                error!(step = %spec.name, step_type = %spec.step_type, error = %message, "blocking step failed");
                Err(EngineError::StepFailed {
                    step_name: spec.name.clone(),
                    step_type: spec.step_type.clone(),
                    error_type,
                    message,
                    validation_details: err.validation_details(),
                    retry_context: None,
                })
            } else {
                warn!(step = %spec.name, step_type = %spec.step_type, error = %message, "non-blocking step failed, continuing");
                ctx.non_blocking_errors.push(NonBlockingError {
                    step_name: spec.name.clone(),
                    step_type: spec.step_type.clone(),
                    error_type,
                    message,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
        }
    }
}
