//! Event names the core itself emits.

use std::fmt;

/// Event names emitted by the tool runner and session manager.
///
/// User code may emit and subscribe to arbitrary string event names —
/// this enum only names the ones the core itself produces, so callers
/// don't have to spell them as string literals and risk a typo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardEvent {
    /// Emitted by the event-emitter middleware before a tool runs.
    ToolCallBegin,
    /// Emitted by the event-emitter middleware after a tool call settles,
    /// whether it succeeded or failed.
    ToolCallEnd,
    /// Emitted when a session transitions from not-yet-started to `idle`.
    SessionStarted,
    /// Emitted when a session is closed.
    SessionEnded,
    /// Emitted when a turn begins processing.
    TurnBegin,
    /// Emitted when a turn finishes, successfully or not.
    TurnEnd,
    /// Emitted when the LLM session's response completes.
    ResponseCompleted,
}

impl StandardEvent {
    /// The event's name, as used with [`crate::EventBus::emit`].
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardEvent::ToolCallBegin => "tool-call-begin",
            StandardEvent::ToolCallEnd => "tool-call-end",
            StandardEvent::SessionStarted => "session-started",
            StandardEvent::SessionEnded => "session-ended",
            StandardEvent::TurnBegin => "turn-begin",
            StandardEvent::TurnEnd => "turn-end",
            StandardEvent::ResponseCompleted => "response-completed",
        }
    }
}

impl fmt::Display for StandardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StandardEvent> for String {
    fn from(event: StandardEvent) -> Self {
        event.as_str().to_string()
    }
}
