//! The ambient event bus, threaded through via [`stepforge_context`].

use std::sync::Arc;

use stepforge_context::ContextKey;

use crate::bus::EventBus;

/// Context key carrying the ambient [`EventBus`].
///
/// Absent a provider, `current()` returns a fresh, subscriber-less bus
/// — emitting to it is a safe no-op. The tool runner and session
/// manager provide a real, shared bus at the top of a session via
/// [`stepforge_context::ContextKey::with_value`]; everything nested
/// below picks it up through `EventBusKey::current()`.
#[derive(ContextKey)]
#[context_key(value = Arc<EventBus>, default = Arc::new(EventBus::new()))]
pub struct EventBusKey;
