//! Sequence runner: strict in-order execution over one shared context.

use fluxo_core::{ExecutionContext, TraceId, TraceKind, TraceStatus};

use crate::error::EngineError;
use crate::flow::FlowStep;
use crate::orchestrator::Orchestrator;

use super::dispatch;

pub(crate) async fn run(
    orch: &Orchestrator,
    ctx: &mut ExecutionContext,
    children: &[FlowStep],
    parent: Option<TraceId>,
) -> Result<(), EngineError> {
    let entry = ctx.trace.open("sequence", TraceKind::Sequence, parent);
    for child in children {
        if let Err(err) = dispatch(orch, ctx, child, Some(entry)).await {
            ctx.trace.close(entry, TraceStatus::Failed);
            return Err(err);
        }
    }
    ctx.trace.close(entry, TraceStatus::Success);
    Ok(())
}
