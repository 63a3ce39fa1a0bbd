//! Fluxo core primitives.
//!
//! This crate carries everything the engine and the step catalog share:
//! the execution context, the step trait and registry, `{{path}}`
//! interpolation and the execution trace recorder.

pub mod context;
pub mod error;
pub mod interpolate;
pub mod registry;
pub mod result;
pub mod trace;

pub use context::{ExecutionContext, NonBlockingError};
pub use error::StepError;
pub use interpolate::{deep_interpolate, interpolate_str, resolve_path};
pub use registry::{MapperFn, Step, StepRegistry, Tools};
pub use result::StepValue;
pub use trace::{
    RetryAttemptRecord, RetryAttemptStatus, TraceEntry, TraceHandle, TraceId, TraceKind,
    TraceRecorder, TraceStatus,
};
