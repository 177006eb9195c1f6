//! Evaluator modes and the configured default action.

/// The evaluator's current operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Fall through to the handler/default action like any other rule miss.
    #[default]
    Default,
    /// Allow everything that reaches this stage.
    AcceptEdits,
    /// Allow everything that reaches this stage, with no further checks.
    Bypass,
    /// Allow only tools the caller has marked read-only; deny everything else.
    Plan,
}

/// The action taken when no bin, mode, or handler resolves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultAction {
    /// Allow the call.
    Allow,
    /// Deny the call.
    #[default]
    Deny,
    /// Require approval.
    Ask,
}
