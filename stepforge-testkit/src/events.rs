//! A recording [`EventHandler`] for asserting on what an
//! [`stepforge_events::EventBus`] emitted during a test.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use stepforge_events::{EventBus, EventHandler};

/// Records every event it is subscribed to, in emission order.
///
/// Subscribe it to the names you care about with [`RecordingEventBus::attach_to`];
/// a single instance can be attached to more than one name on the same
/// bus to capture an entire lifecycle (`session-started`, `turn-begin`,
/// `turn-end`, ...).
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingEventBus {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    /// Subscribe this recorder to `event_name` on `bus`.
    pub fn attach_to(self: &std::sync::Arc<Self>, bus: &EventBus, event_name: impl Into<String>) {
        bus.on(event_name, Shared(self.clone()));
    }

    /// Every `(event_name, payload)` pair recorded so far, oldest first.
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().expect("recorder lock poisoned").clone()
    }

    /// The names of every event recorded so far, oldest first.
    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

#[async_trait]
impl EventHandler for RecordingEventBus {
    async fn handle(&self, event: &str, payload: &Value) {
        self.events
            .lock()
            .expect("recorder lock poisoned")
            .push((event.to_string(), payload.clone()));
    }
}

// `EventBus::on` takes ownership of its handler and wraps it in its own
// `Arc`; a bare `Arc<RecordingEventBus>` can't implement the foreign
// `EventHandler` trait directly (`Arc` isn't a fundamental type, so the
// orphan rule doesn't see through it to `RecordingEventBus`), so this
// local wrapper carries the shared handle instead.
#[derive(Clone)]
struct Shared(std::sync::Arc<RecordingEventBus>);

#[async_trait]
impl EventHandler for Shared {
    async fn handle(&self, event: &str, payload: &Value) {
        self.0.handle(event, payload).await;
    }
}
