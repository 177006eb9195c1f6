//! The `ContextKey` trait implemented by `#[derive(ContextKey)]`.

use std::future::Future;

use tokio::task::{futures::TaskLocalFuture, LocalKey};

/// A key into the ambient, task-local context.
///
/// `K: ContextKey` declares a value type and a default; the backing
/// task-local slot is private to the key and filled in by
/// `#[derive(ContextKey)]` — this trait is not meant to be implemented
/// by hand, since two independently hand-written impls for the same
/// key type would race to define the same slot.
///
/// Lookup order is innermost [`ContextKey::with_value`] scope first,
/// falling back to [`ContextKey::default_value`]; lookups never fail
/// and never panic. A value installed by `with_value` is visible to
/// every task directly awaited from inside `f` (same task, so the same
/// task-local slot), but not to a sibling spawned with `tokio::spawn`
/// — that sibling runs on its own task and sees only its own ambient
/// defaults unless it is explicitly re-scoped.
pub trait ContextKey: Sized + 'static {
    /// The value this key carries.
    type Value: Clone + Send + 'static;

    /// The value observed when no provider is in scope for this task.
    fn default_value() -> Self::Value;

    #[doc(hidden)]
    fn __task_local() -> &'static LocalKey<Self::Value>;

    /// The innermost provided value, or [`ContextKey::default_value`]
    /// if none is in scope.
    fn current() -> Self::Value {
        Self::__task_local()
            .try_with(Clone::clone)
            .unwrap_or_else(|_| Self::default_value())
    }

    /// Install `value` for the duration of `f` and every task `f`
    /// directly awaits. Nested calls for the same key shadow the outer
    /// value for their own duration and restore it on return.
    fn with_value<F>(value: Self::Value, f: F) -> TaskLocalFuture<Self::Value, F>
    where
        F: Future,
    {
        Self::__task_local().scope(value, f)
    }
}
