//! `Relay<T>`: a get/set view over a [`Memory`] cell, a pure mapping, or
//! a constant.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use crate::memory::Memory;

enum Backing<T> {
    /// Backed directly by a `Memory` cell of the same type — the only
    /// backing that supports atomic `with_lock`-based mutation.
    Cell(Memory<T>),
    /// A pure `get`/`set` pair, e.g. produced by [`Relay::map`].
    Mapped {
        get: Arc<dyn Fn() -> T + Send + Sync>,
        set: Option<Arc<dyn Fn(T) + Send + Sync>>,
    },
    /// A fixed value; `set` is a no-op.
    Constant(T),
}

/// A read/write (or read-only) view over some piece of state.
///
/// Unlike [`Memory`], a `Relay` does not necessarily own storage — it
/// may be a pure function of another Relay or Memory cell. Relays are
/// cheap to clone (the backing is reference-counted) and may be shared
/// freely across tasks.
pub struct Relay<T> {
    backing: Arc<Backing<T>>,
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            backing: Arc::clone(&self.backing),
        }
    }
}

/// Attempting to write through a read-only Relay.
#[derive(Debug, thiserror::Error)]
#[error("relay has no setter")]
pub struct RelayReadOnly;

impl<T: Clone + Send + Sync + 'static> Relay<T> {
    /// A read/write relay backed directly by a Memory cell.
    ///
    /// This is the only construction that supports atomic,
    /// `with_lock`-based convenience mutators.
    pub fn from_cell(cell: Memory<T>) -> Self {
        Self {
            backing: Arc::new(Backing::Cell(cell)),
        }
    }

    /// A relay whose reads are fixed and whose writes are discarded.
    pub fn constant(value: T) -> Self {
        Self {
            backing: Arc::new(Backing::Constant(value)),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> T {
        match &*self.backing {
            Backing::Cell(cell) => cell.get(),
            Backing::Mapped { get, .. } => get(),
            Backing::Constant(value) => value.clone(),
        }
    }

    /// Write a new value.
    ///
    /// Returns [`RelayReadOnly`] if this relay has no setter (a mapped
    /// relay constructed without `reverse`, or a constant relay — note
    /// the constant case still reports success since "no-op" is the
    /// documented behavior, not an error).
    pub fn set(&self, value: T) -> Result<(), RelayReadOnly> {
        match &*self.backing {
            Backing::Cell(cell) => {
                cell.set(value);
                Ok(())
            }
            Backing::Mapped { set: Some(set), .. } => {
                set(value);
                Ok(())
            }
            Backing::Mapped { set: None, .. } => Err(RelayReadOnly),
            Backing::Constant(_) => Ok(()),
        }
    }

    /// Run `f` with exclusive, atomic access to the backing cell.
    ///
    /// Returns `None` if this relay is not directly backed by a Memory
    /// cell (a mapped or constant relay has no single lock to acquire).
    /// Convenience mutators fall back to a non-atomic get/modify/set
    /// sequence in that case.
    pub fn try_with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match &*self.backing {
            Backing::Cell(cell) => Some(cell.with_lock(f)),
            _ => None,
        }
    }

    fn update(&self, f: impl FnOnce(&mut T)) {
        if self.try_with_lock(|v| f(v)).is_none() {
            let mut value = self.get();
            f(&mut value);
            let _ = self.set(value);
        }
    }

    /// Derive a new relay by applying `forward` to reads.
    ///
    /// If `reverse` is given, writes to the mapped relay apply
    /// `reverse` and write the result back through `self`. Without
    /// `reverse`, the mapped relay is read-only: [`Relay::set`] returns
    /// [`RelayReadOnly`].
    pub fn map<U, F, R>(&self, forward: F, reverse: Option<R>) -> Relay<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
        R: Fn(U) -> T + Send + Sync + 'static,
    {
        let source = self.clone();
        let get: Arc<dyn Fn() -> U + Send + Sync> = Arc::new(move || forward(source.get()));
        let set: Option<Arc<dyn Fn(U) + Send + Sync>> = reverse.map(|reverse| {
            let source = self.clone();
            let boxed: Arc<dyn Fn(U) + Send + Sync> = Arc::new(move |value: U| {
                let _ = source.set(reverse(value));
            });
            boxed
        });
        Relay {
            backing: Arc::new(Backing::Mapped { get, set }),
        }
    }
}

impl<T> Relay<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    /// Append an item to the end of the backing vector.
    pub fn append(&self, item: T) {
        self.update(|v| v.push(item));
    }
}

impl<T> Relay<HashSet<T>>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Insert an item into the backing set.
    pub fn insert(&self, item: T) {
        self.update(|set| {
            set.insert(item);
        });
    }

    /// Remove an item from the backing set.
    pub fn remove(&self, item: &T) {
        self.update(|set| {
            set.remove(item);
        });
    }

    /// Whether the backing set currently contains `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.get().contains(item)
    }

    /// Union the backing set with `other`, in place.
    pub fn union(&self, other: &HashSet<T>) {
        self.update(|set| {
            for item in other {
                set.insert(item.clone());
            }
        });
    }
}

impl Relay<i64> {
    /// Add `delta` to the backing integer cell atomically.
    pub fn add(&self, delta: i64) -> i64 {
        self.update_and_get(|n| *n += delta)
    }

    /// Add one to the backing integer cell atomically.
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Subtract one from the backing integer cell atomically.
    pub fn decrement(&self) -> i64 {
        self.add(-1)
    }
}

impl<T: Clone + Send + Sync + 'static> Relay<T> {
    fn update_and_get(&self, f: impl FnOnce(&mut T)) -> T
    where
        T: Copy,
    {
        if let Some(result) = self.try_with_lock(|v| {
            f(v);
            *v
        }) {
            result
        } else {
            let mut value = self.get();
            f(&mut value);
            let _ = self.set(value);
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_from_cell_reads_and_writes_through() {
        let cell = Memory::new(10);
        let relay = Relay::from_cell(cell.clone());
        assert_eq!(relay.get(), 10);
        relay.set(20).unwrap();
        assert_eq!(cell.get(), 20);
    }

    #[test]
    fn constant_relay_ignores_writes() {
        let relay = Relay::constant(5);
        assert_eq!(relay.get(), 5);
        relay.set(99).unwrap();
        assert_eq!(relay.get(), 5);
    }

    #[test]
    fn mapped_relay_without_reverse_is_read_only() {
        let cell = Memory::new(3);
        let base = Relay::from_cell(cell);
        let doubled: Relay<i32> = base.map(|n| n * 2, None::<fn(i32) -> i32>);
        assert_eq!(doubled.get(), 6);
        assert!(doubled.set(10).is_err());
    }

    #[test]
    fn mapped_relay_with_reverse_writes_back_through_source() {
        let cell = Memory::new(3);
        let base = Relay::from_cell(cell.clone());
        let doubled = base.map(|n| n * 2, Some(|n: i32| n / 2));
        doubled.set(10).unwrap();
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn append_is_atomic_via_with_lock_on_cell_backed_relay() {
        let cell = Memory::new(Vec::<i32>::new());
        let relay = Relay::from_cell(cell.clone());
        relay.append(1);
        relay.append(2);
        assert_eq!(cell.get(), vec![1, 2]);
    }

    #[test]
    fn set_insert_remove_contains() {
        let cell = Memory::new(HashSet::<String>::new());
        let relay = Relay::from_cell(cell);
        relay.insert("a".to_string());
        relay.insert("b".to_string());
        assert!(relay.contains(&"a".to_string()));
        relay.remove(&"a".to_string());
        assert!(!relay.contains(&"a".to_string()));
    }

    #[test]
    fn integer_add_on_cell_backed_relay() {
        let cell = Memory::new(0i64);
        let relay = Relay::from_cell(cell);
        relay.add(3);
        relay.add(4);
        assert_eq!(relay.get(), 7);
    }

    #[test]
    fn integer_increment_and_decrement_on_cell_backed_relay() {
        let cell = Memory::new(0i64);
        let relay = Relay::from_cell(cell);
        assert_eq!(relay.increment(), 1);
        assert_eq!(relay.increment(), 2);
        assert_eq!(relay.decrement(), 1);
        assert_eq!(relay.get(), 1);
    }
}
