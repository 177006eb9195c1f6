//! The ambient event bus: `emit`/`on`/`off` over string-named events,
//! plus the names the core itself emits.
//!
//! ```
//! # use stepforge_events::{EventBus, StandardEvent};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new();
//! bus.on_fn(StandardEvent::ToolCallBegin, |_name, payload| async move {
//!     println!("tool call begin: {payload}");
//! });
//! bus.emit(StandardEvent::ToolCallBegin, serde_json::json!({ "tool": "grep" })).await;
//! # }
//! ```

mod bus;
mod key;
mod standard;

pub use bus::{EventBus, EventHandler};
pub use key::EventBusKey;
pub use standard::StandardEvent;
