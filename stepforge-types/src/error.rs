//! Shared error kinds.
//!
//! Each enum here is a *kind* taxonomy, not a concrete exception
//! hierarchy — callers match on variants to decide policy (retry?
//! surface to the user? log and swallow?) without needing to know
//! which crate produced the error. Every layer's kinds live in this one
//! crate, even though the kinds themselves (composition, session) are
//! meaningful only to `stepforge-step`/`stepforge-session`, so that
//! `StepForgeError` can enumerate the whole taxonomy in one place and
//! every layer converts into it via `#[from]` rather than duplicating
//! variants.

use thiserror::Error;

/// Permission-evaluator and middleware-pipeline denial reasons.
///
/// `ApprovalRequired` is the one recoverable variant: a caller may
/// re-issue the same call after obtaining user consent. Every other
/// variant is terminal for that invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PermissionError {
    /// A `deny` or `final-deny` rule matched the request.
    #[error("denied by rule: {0}")]
    DeniedByRule(String),
    /// The permission handler returned `block` or an explicit deny.
    #[error("denied by handler: {0}")]
    DeniedByHandler(String),
    /// A hook halted the call before it reached the tool.
    #[error("denied by hook: {0}")]
    DeniedByHook(String),
    /// The evaluator's current mode denies the tool outright (e.g. `plan`
    /// mode denying a non-read-only tool).
    #[error("denied by mode: {0}")]
    DeniedByMode(String),
    /// No rule or handler resolved the call; caller must obtain consent
    /// and re-issue.
    #[error("approval required: {0}")]
    ApprovalRequired(String),
}

impl PermissionError {
    /// Whether the caller may retry this exact call after user consent.
    ///
    /// Only [`PermissionError::ApprovalRequired`] is recoverable; every
    /// deny-class variant is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PermissionError::ApprovalRequired(_))
    }
}

/// Errors produced by the middleware pipeline itself, as opposed to the
/// tool it wraps.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Permission or a before-hook replaced the arguments JSON, and the
    /// replacement failed to deserialize into the tool's argument type.
    #[error("argument parse failed: {cause} (modified args: {modified_args})")]
    ArgumentParseFailed {
        /// The JSON value that failed to deserialize.
        modified_args: serde_json::Value,
        /// The underlying deserialization error, rendered as text.
        cause: String,
    },
    /// A middleware short-circuited (returned without calling `next`) on
    /// a typed tool, which has no way to synthesize a typed output from
    /// a short-circuit.
    #[error("middleware short-circuited before producing a typed output")]
    MiddlewareShortCircuited,
    /// An error-hook asked to substitute a fallback output for a failed
    /// call. Internal signal: the type-erased pipeline wrapper that runs
    /// error-hooks catches this itself and returns the fallback string as
    /// the tool output, so it should never reach a caller.
    #[error("fallback requested: {fallback_output}")]
    FallbackRequested {
        /// The output to use in place of the failed call.
        fallback_output: String,
    },
}

/// Errors arising from executing a single tool call or step.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// The call exceeded its configured timeout and was cancelled.
    #[error("timed out after {0}")]
    Timeout(crate::DurationMs),
    /// A retry wrapper exhausted its attempt budget.
    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The last error observed before giving up.
        last_error: String,
    },
    /// No tool is registered under the requested name.
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    /// The tool rejected its arguments as structurally invalid.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Errors from step composition combinators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompositionError {
    /// A gate blocked the value from proceeding.
    #[error("gate blocked: {0}")]
    GateBlocked(String),
    /// A loop reached its iteration cap without its condition resolving.
    #[error("loop reached max iterations without its condition being met")]
    LoopConditionNotMet,
    /// Every child of a `Parallel` failed.
    #[error("all {} parallel children failed: {}", .0.len(), join_errors(.0))]
    ParallelAllFailed(Vec<String>),
    /// Every child of a `Race` failed.
    #[error("all {} race children failed: {}", .0.len(), join_errors(.0))]
    RaceAllFailed(Vec<String>),
    /// A `Race`'s timeout elapsed before any child succeeded.
    #[error("race timed out before any child succeeded")]
    RaceTimeout,
}

fn join_errors(errors: &[String]) -> String {
    errors.join("; ")
}

/// Errors from the interactive session manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    /// The waiter was cancelled before its turn began processing.
    #[error("cancelled")]
    Cancelled,
    /// The session has been closed and accepts no further messages.
    #[error("session closed")]
    SessionClosed,
}

/// Errors from the optional session/state persistence collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
    /// No checkpoint exists under the requested identifier.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),
    /// The requested storage path does not exist.
    #[error("path not found: {0}")]
    PathNotFound(String),
    /// Restoring from a checkpoint failed.
    #[error("restore failed for {path}: {cause}")]
    RestoreFailed {
        /// Path of the checkpoint that failed to restore.
        path: String,
        /// The underlying cause, rendered as text.
        cause: String,
    },
}

/// Top-level error for callers that don't care which layer failed.
///
/// Every layer-specific enum above converts into this via `#[from]`, so
/// a function that touches permission checks, the pipeline, and tool
/// execution can return a single error type and still let callers match
/// on the original kind through `From`/`source()`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepForgeError {
    /// A permission-evaluator or middleware-pipeline denial.
    #[error(transparent)]
    Permission(#[from] PermissionError),
    /// A pipeline-internal error (argument re-injection, short-circuit).
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// A tool-execution error (timeout, retry exhaustion, not found).
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// A step-composition error (gate, loop, parallel, race).
    #[error(transparent)]
    Composition(#[from] CompositionError),
    /// A session-manager error.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// A state/checkpoint persistence error.
    #[error(transparent)]
    State(#[from] StateError),
}
