//! Shared ids, errors, and structured-value conversions used across the
//! stepforge workspace. This crate sits at the bottom of the dependency
//! graph — every other crate depends on it, it depends on nothing in
//! the workspace.

pub mod duration;
pub mod error;
pub mod id;
pub mod structured;
pub mod tool_descriptor;

pub use duration::DurationMs;
pub use error::{
    CompositionError, ExecutionError, PermissionError, PipelineError, SessionError, StateError,
    StepForgeError,
};
pub use id::{SessionId, ToolUseId, TurnId};
pub use structured::{to_structured, FromStructured, StructuredValue, ToPromptRepresentation};
pub use tool_descriptor::{schema_for, ToolDefinition};
