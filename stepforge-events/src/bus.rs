//! The event bus itself.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as EventPayload;

/// Something that can react to an emitted event.
///
/// Implemented directly for complex subscribers (a logger, a metrics
/// sink); use [`EventBus::on_fn`] to subscribe a plain closure instead
/// of implementing this by hand.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one emission of `event` carrying `payload`.
    async fn handle(&self, event: &str, payload: &EventPayload);
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(String, EventPayload) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn handle(&self, event: &str, payload: &EventPayload) {
        (self.0)(event.to_string(), payload.clone()).await;
    }
}

/// `emit`/`on`/`off` over string-named events with a JSON payload.
///
/// Handlers for a given event name run sequentially, in registration
/// order, on the task that calls [`EventBus::emit`] — emitting is not
/// fire-and-forget, it awaits every handler before returning. Panics
/// inside a handler are not caught; a misbehaving observer can take
/// down the caller, same as any other `.await`ed call.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    /// Create an empty bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `event_name`.
    pub fn on(&self, event_name: impl Into<String>, handler: impl EventHandler + 'static) {
        self.handlers
            .write()
            .expect("event bus lock poisoned")
            .entry(event_name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Subscribe a plain async closure to `event_name`.
    pub fn on_fn<F, Fut>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(String, EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(event_name, FnHandler(handler));
    }

    /// Remove every handler subscribed to `event_name`.
    pub fn off(&self, event_name: &str) {
        self.handlers
            .write()
            .expect("event bus lock poisoned")
            .remove(event_name);
    }

    /// Emit `event_name` with `payload` to every subscribed handler, in
    /// registration order.
    pub async fn emit(&self, event_name: impl Into<String>, payload: EventPayload) {
        let event_name = event_name.into();
        let handlers = {
            let guard = self.handlers.read().expect("event bus lock poisoned");
            guard.get(&event_name).cloned().unwrap_or_default()
        };
        if handlers.is_empty() {
            tracing::trace!(event = %event_name, "emit: no subscribers");
            return;
        }
        tracing::debug!(event = %event_name, subscribers = handlers.len(), "emit");
        for handler in &handlers {
            handler.handle(&event_name, &payload).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emits_to_subscribed_handlers_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        bus.on_fn("ping", move |_name, _payload| {
            let o1 = Arc::clone(&o1);
            async move {
                o1.lock().unwrap().push(1);
            }
        });
        let o2 = Arc::clone(&order);
        bus.on_fn("ping", move |_name, _payload| {
            let o2 = Arc::clone(&o2);
            async move {
                o2.lock().unwrap().push(2);
            }
        });

        bus.emit("ping", EventPayload::Null).await;
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn unsubscribed_event_names_are_silently_ignored() {
        let bus = EventBus::new();
        bus.emit("nothing-listens-here", EventPayload::Null).await;
    }

    #[tokio::test]
    async fn off_removes_all_handlers_for_the_name() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        bus.on_fn("x", move |_name, _payload| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        bus.off("x");
        bus.emit("x", EventPayload::Null).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn independent_event_names_do_not_interfere() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.on_fn("a", move |_name, _payload| {
            let h = Arc::clone(&h);
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        bus.emit("b", EventPayload::Null).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
