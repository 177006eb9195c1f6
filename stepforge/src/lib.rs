#![deny(missing_docs)]
//! # stepforge — umbrella crate
//!
//! A single import surface over the stepforge workspace. Re-exports
//! each crate behind a feature flag, plus a `prelude` for the happy
//! path of composing steps, tools, and sessions.

#[cfg(feature = "core")]
pub use stepforge_context;
#[cfg(feature = "core")]
pub use stepforge_events;
#[cfg(feature = "guardrail")]
pub use stepforge_guardrail;
#[cfg(feature = "permission")]
pub use stepforge_permission;
#[cfg(feature = "session")]
pub use stepforge_session;
#[cfg(feature = "step")]
pub use stepforge_step;
#[cfg(feature = "core")]
pub use stepforge_state;
#[cfg(feature = "test-utils")]
pub use stepforge_testkit;
#[cfg(feature = "tool")]
pub use stepforge_tool;
#[cfg(feature = "core")]
pub use stepforge_types;

/// Happy-path imports for composing stepforge systems.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use stepforge_types::{
        CompositionError, DurationMs, ExecutionError, PermissionError, PipelineError,
        SessionError, SessionId, StateError, StepForgeError, ToolUseId, TurnId,
    };

    #[cfg(feature = "core")]
    pub use stepforge_state::{Memory, Relay, RelayReadOnly};

    #[cfg(feature = "core")]
    pub use stepforge_context::ContextKey;

    #[cfg(feature = "core")]
    pub use stepforge_events::{EventBus, EventBusKey, StandardEvent};

    #[cfg(feature = "permission")]
    pub use stepforge_permission::{PermissionEvaluator, PermissionHandler, Rule, RuleSet, Verdict};

    #[cfg(feature = "guardrail")]
    pub use stepforge_guardrail::{Guardrail, GuardrailChain, SandboxConfig};

    #[cfg(feature = "tool")]
    pub use stepforge_tool::{Tool, ToolContext, ToolMiddleware, ToolRegistry};

    #[cfg(feature = "step")]
    pub use stepforge_step::{Step, StepExt};

    #[cfg(feature = "session")]
    pub use stepforge_session::{SessionBacking, SessionManager};

    #[cfg(feature = "test-utils")]
    pub use stepforge_testkit::{AlwaysFailTool, EchoSession, RecordingEventBus, UppercaseTool};
}
