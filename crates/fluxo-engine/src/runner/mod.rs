//! Node runners, one per flow step kind.
//!
//! Dispatch is pattern matching over the compiled sum type; only the unit
//! runner consults the step registry. Recursion goes through a boxed future
//! because combinators nest arbitrarily.

mod conditional;
mod parallel;
mod retry;
mod sequence;
mod unit;

use futures::future::BoxFuture;

use fluxo_core::{ExecutionContext, TraceId};

use crate::error::EngineError;
use crate::flow::FlowStep;
use crate::orchestrator::Orchestrator;

pub(crate) fn dispatch<'a>(
    orch: &'a Orchestrator,
    ctx: &'a mut ExecutionContext,
    step: &'a FlowStep,
    parent: Option<TraceId>,
) -> BoxFuture<'a, Result<(), EngineError>> {
    Box::pin(async move {
        match step {
            FlowStep::Unit(spec) => unit::run(orch, ctx, spec, parent).await,
            FlowStep::Sequence(children) => sequence::run(orch, ctx, children, parent).await,
            FlowStep::Parallel(children) => parallel::run(orch, ctx, children, parent).await,
            FlowStep::Conditional {
                expression,
                then,
                otherwise,
            } => conditional::run(orch, ctx, expression, then, otherwise.as_deref(), parent).await,
            FlowStep::Retry(spec) => retry::run(orch, ctx, spec, parent).await,
        }
    })
}
