//! The standard executor context key: session and turn identity carried
//! alongside every step and tool invocation.

use stepforge_context_macros::ContextKey;
use stepforge_types::{SessionId, TurnId};

/// Session/turn identity threaded through a step tree via [`ExecutorContextKey`].
///
/// The permission evaluator and the event-emitting middleware both read
/// this to stamp `session-id`/`turn-id` onto rule lookups and emitted
/// events without either one needing the full session manager as a
/// dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorContext {
    /// The session this invocation belongs to.
    pub session_id: SessionId,
    /// The turn this invocation belongs to.
    pub turn_id: TurnId,
}

/// Context key carrying the ambient [`ExecutorContext`].
///
/// Absent any provider, `current()` returns a context with empty ids —
/// code that cares whether it's actually inside a session should check
/// for that rather than treat it as a real identity.
#[derive(ContextKey)]
#[context_key(value = ExecutorContext, default = ExecutorContext::default())]
pub struct ExecutorContextKey;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextKey as _;

    #[tokio::test]
    async fn default_is_empty_ids() {
        let ctx = ExecutorContextKey::current();
        assert_eq!(ctx.session_id, SessionId::default());
    }

    #[tokio::test]
    async fn with_value_is_visible_to_awaited_subtasks() {
        let provided = ExecutorContext {
            session_id: SessionId::new("s1"),
            turn_id: TurnId::new("t1"),
        };
        ExecutorContextKey::with_value(provided.clone(), async move {
            async fn inner() -> ExecutorContext {
                ExecutorContextKey::current()
            }
            assert_eq!(inner().await, provided);
        })
        .await;
    }

    #[tokio::test]
    async fn nested_with_value_shadows_and_restores() {
        let outer = ExecutorContext {
            session_id: SessionId::new("outer"),
            turn_id: TurnId::new("t"),
        };
        let inner = ExecutorContext {
            session_id: SessionId::new("inner"),
            turn_id: TurnId::new("t"),
        };
        ExecutorContextKey::with_value(outer.clone(), async {
            assert_eq!(ExecutorContextKey::current().session_id, outer.session_id);
            ExecutorContextKey::with_value(inner.clone(), async {
                assert_eq!(ExecutorContextKey::current().session_id, inner.session_id);
            })
            .await;
            assert_eq!(ExecutorContextKey::current().session_id, outer.session_id);
        })
        .await;
    }
}
