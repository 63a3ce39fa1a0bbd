//! Flow orchestration: the run entry point, trace finalization and output
//! resolution.

use serde_json::Value;
use tracing::{info, warn};

use fluxo_core::{ExecutionContext, NonBlockingError, StepRegistry, Tools, TraceEntry};

use crate::error::EngineError;
use crate::flow::FlowDefinition;
use crate::output::resolve_flow_output;
use crate::runner::dispatch;

/// Everything a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: Value,
    pub trace: Vec<TraceEntry>,
    pub trace_rendered: String,
    pub non_blocking_errors: Vec<NonBlockingError>,
    pub duration_ms: u64,
}

/// Interprets flow definitions against a step registry.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    registry: StepRegistry,
    tools: Tools,
}

impl Orchestrator {
    pub fn new(registry: StepRegistry) -> Self {
        Self {
            registry,
            tools: Tools::new(),
        }
    }

    pub fn with_tools(mut self, tools: Tools) -> Self {
        self.tools = tools;
        self
    }

    pub(crate) fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub(crate) fn tools(&self) -> &Tools {
        &self.tools
    }

    /// Run a flow to completion.
    ///
    /// Root steps execute in order. A blocking failure propagates after the
    /// trace is finalized, so every opened entry reaches a terminal status
    /// either way.
    pub async fn run(&self, flow: &FlowDefinition, input: Value) -> Result<RunOutcome, EngineError> {
        info!(flow = %flow.name, steps = flow.steps.len(), "starting flow");
        let mut ctx = ExecutionContext::new(input);

        let mut run_result = Ok(());
        for step in &flow.steps {
            if let Err(err) = dispatch(self, &mut ctx, step, None).await {
                run_result = Err(err);
                break;
            }
        }

        let trace = ctx.trace.snapshot();
        let duration_ms = ctx.trace.total_duration_ms();
        let trace_rendered = ctx.trace.render();
        info!(flow = %flow.name, "execution trace:\n{}", trace_rendered);
        if !ctx.non_blocking_errors.is_empty() {
            warn!(
                flow = %flow.name,
                count = ctx.non_blocking_errors.len(),
                errors = %serde_json::to_string(&ctx.non_blocking_errors).unwrap_or_default(),
                "flow finished with non-blocking errors"
            );
        }

        run_result?;
        Ok(RunOutcome {
            output: resolve_flow_output(&flow.steps, &ctx),
            trace,
            trace_rendered,
            non_blocking_errors: ctx.non_blocking_errors,
            duration_ms,
        })
    }
}
