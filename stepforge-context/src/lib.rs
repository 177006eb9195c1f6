//! Task-local context propagation.
//!
//! A context key declares a value type and a default. Providing
//! `K := v` for an async operation installs `v` for the duration of
//! that operation and every task it directly awaits; a sibling task
//! spawned from inside never observes it. Nested providers for the
//! same key shadow the outer value and restore it on return.
//!
//! ```
//! use stepforge_context::{ContextKey, ExecutorContext, ExecutorContextKey};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = ExecutorContext {
//!     session_id: "s1".into(),
//!     turn_id: "t1".into(),
//! };
//! ExecutorContextKey::with_value(ctx, async {
//!     assert_eq!(ExecutorContextKey::current().session_id.as_str(), "s1");
//! })
//! .await;
//! # }
//! ```

extern crate self as stepforge_context;

mod executor;
mod key;

pub use executor::{ExecutorContext, ExecutorContextKey};
pub use key::ContextKey;
pub use stepforge_context_macros::ContextKey;

#[doc(hidden)]
pub mod __private {
    pub use tokio;
}
