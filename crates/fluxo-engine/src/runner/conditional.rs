//! Conditional runner: interpolate, evaluate, run exactly one branch.

use serde_json::json;
use tracing::debug;

use fluxo_core::{interpolate_str, ExecutionContext, TraceId, TraceKind, TraceStatus};

use crate::condition::evaluate_value;
use crate::error::EngineError;
use crate::flow::FlowStep;
use crate::orchestrator::Orchestrator;

use super::dispatch;

pub(crate) async fn run(
    orch: &Orchestrator,
    ctx: &mut ExecutionContext,
    expression: &str,
    then: &FlowStep,
    otherwise: Option<&FlowStep>,
    parent: Option<TraceId>,
) -> Result<(), EngineError> {
    let entry = ctx.trace.open("conditional", TraceKind::Conditional, parent);

    let interpolated = interpolate_str(expression, &ctx.interpolation_scope());
    let result = evaluate_value(&interpolated);
    debug!(condition = expression, result, "evaluated condition");

    let branch = if result { Some(then) } else { otherwise };
    let executed_branch = match (result, branch.is_some()) {
        (true, _) => "then",
        (false, true) => "else",
        (false, false) => "none",
    };
    let meta = json!({
        "condition": expression,
        "conditionResult": result,
        "executedBranch": executed_branch,
    });

    if let Some(step) = branch {
        if let Err(err) = dispatch(orch, ctx, step, Some(entry)).await {
            ctx.trace.close_with_meta(entry, TraceStatus::Failed, meta);
            return Err(err);
        }
    }
    ctx.trace.close_with_meta(entry, TraceStatus::Success, meta);
    Ok(())
}
