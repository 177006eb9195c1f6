//! The optional interactive delegate consulted when rules don't resolve
//! a request, plus the request/context shape it is consulted with.

use async_trait::async_trait;
use serde_json::Value as StructuredValue;
use stepforge_types::{SessionId, TurnId};

/// One prior tool call made during the current turn.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// The tool that was called.
    pub tool_name: String,
    /// The arguments it was called with.
    pub arguments: StructuredValue,
}

/// Session/turn identity and call history carried alongside every
/// evaluation request.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// The session this request belongs to.
    pub session_id: SessionId,
    /// The turn this request belongs to.
    pub turn_id: TurnId,
    /// Tool calls already made earlier in the same turn, oldest first.
    pub prior_calls: Vec<ToolCallRecord>,
}

/// The question posed to a [`PermissionHandler`].
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    /// The tool being called.
    pub tool_name: String,
    /// The arguments it is being called with.
    pub arguments: StructuredValue,
    /// Session/turn identity and call history.
    pub context: EvaluationContext,
}

/// What a [`PermissionHandler`] decided.
#[derive(Debug, Clone)]
pub enum HandlerDecision {
    /// Allow this one call.
    Allow,
    /// Allow this one call, with the arguments replaced.
    AllowWithModifiedArguments(StructuredValue),
    /// Deny this one call.
    Deny(Option<String>),
    /// Allow this call and remember the verdict for future matching calls.
    AlwaysAllow,
    /// Deny this call and remember the verdict for future matching calls.
    Block,
}

/// An interactive (typically user-facing) delegate consulted at
/// evaluation step 7, after rule bins and mode default have all failed
/// to resolve a request.
#[async_trait]
pub trait PermissionHandler: Send + Sync {
    /// Decide the verdict for `request`.
    async fn ask(&self, request: &PermissionRequest) -> HandlerDecision;
}
