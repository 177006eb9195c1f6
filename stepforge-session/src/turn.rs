//! The response shape a successful turn yields.

use serde_json::Value;

use stepforge_types::DurationMs;

/// A tool-call record surfaced in a turn's response, built from the
/// `tool-call-begin`/`tool-call-end` events the middleware pipeline
/// emitted while the turn was running.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    /// Correlates this record with the middleware's events.
    pub tool_use_id: String,
    /// The tool's registered name.
    pub name: String,
    /// Whether the call succeeded. `false` until its `tool-call-end`
    /// event arrives.
    pub success: bool,
    /// How long the call took, end to end. Zero until completion.
    pub duration: DurationMs,
}

/// The result of one successfully-processed turn.
#[derive(Debug, Clone)]
pub struct TurnResponse {
    /// The assistant's rendered text content.
    pub content: String,
    /// The raw, provider-shaped response payload.
    pub raw_content: Value,
    /// Transcript entries recorded for this turn.
    pub transcript_entries: Vec<Value>,
    /// Tool calls the middleware pipeline recorded during this turn,
    /// in invocation-begin order, not completion order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Wall-clock time the turn took, from dequeue to response.
    pub duration: DurationMs,
}
