//! Fluxo flow engine.
//!
//! Interprets declarative flow definitions: a tree of units, sequences,
//! parallels, conditionals and retries, executed against an
//! [`ExecutionContext`](fluxo_core::ExecutionContext) with `{{path}}`
//! interpolation, an execution trace and deterministic output resolution.

pub mod condition;
pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod output;
pub(crate) mod runner;

pub use error::{EngineError, RetryContext, RetryFailureReason};
pub use flow::{find_output_unit, FlowDefinition, FlowStep, RetryPolicy, RetrySpec, UnitSpec};
pub use orchestrator::{Orchestrator, RunOutcome};
