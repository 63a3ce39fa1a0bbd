//! Parallel runner: forked branch contexts, await-all, ordered merge.
//!
//! Every branch runs against its own context fork so sibling mutations stay
//! unobserved until the merge. All branches are awaited even when one fails;
//! on failure nothing merges and the first failing branch in array order
//! propagates, keeping runs reproducible.

use futures::future::join_all;
use tracing::debug;

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
    let entry = ctx.trace.open("parallel", TraceKind::Parallel, parent);

    let mut branches: Vec<ExecutionContext> = children.iter().map(|_| ctx.fork()).collect();
    let futures = children
        .iter()
        .zip(branches.iter_mut())
        .map(|(child, branch)| dispatch(orch, branch, child, Some(entry)));
    let results = join_all(futures).await;

    if let Some(first_failure) = results.into_iter().find_map(Result::err) {
        ctx.trace.close(entry, TraceStatus::Failed);
        return Err(first_failure);
    }

    debug!(branches = branches.len(), "merging parallel branches");
    for branch in branches {
        ctx.merge_branch(branch);
    }
    ctx.trace.close(entry, TraceStatus::Success);
    Ok(())
}
