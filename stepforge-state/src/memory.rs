//! `Memory<T>`: a mutex-guarded, reference-counted cell.

use std::sync::{Arc, Mutex};

/// A share-safe mutable cell, identified by address rather than value.
///
/// Cloning a `Memory` clones the handle, not the cell — all clones
/// observe the same underlying value, and [`Memory::same_cell`] (and
/// `PartialEq`) compare the cells by address, not by content. This
/// matters for step composition: two `Memory<Vec<String>>` handles
/// that currently hold equal vectors are still different cells unless
/// they were cloned from each other.
///
/// `get`/`set` are independent lock acquisitions; [`Memory::with_lock`]
/// holds the lock across a read-modify-write closure so concurrent
/// writers can't interleave between a read and the write that depends
/// on it.
#[derive(Debug)]
pub struct Memory<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Memory<T> {
    /// Create a new cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Whether `self` and `other` are handles to the same cell.
    pub fn same_cell(&self, other: &Memory<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with exclusive access to the cell and return its result.
    ///
    /// Use this instead of a separate `get` followed by `set` whenever
    /// the new value depends on the old one — that sequence is not
    /// atomic under concurrent writers, `with_lock` is.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().expect("memory cell lock poisoned");
        f(&mut guard)
    }
}

impl<T: Clone> Memory<T> {
    /// Read the current value.
    pub fn get(&self) -> T {
        self.inner.lock().expect("memory cell lock poisoned").clone()
    }

    /// Overwrite the current value.
    pub fn set(&self, value: T) {
        *self.inner.lock().expect("memory cell lock poisoned") = value;
    }
}

impl<T> Clone for Memory<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Memory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same_cell(other)
    }
}

impl<T> Eq for Memory<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_cell() {
        let a = Memory::new(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn independent_cells_are_not_equal_even_with_equal_values() {
        let a = Memory::new(vec![1, 2, 3]);
        let b = Memory::new(vec![1, 2, 3]);
        assert_ne!(a, b);
    }

    #[test]
    fn with_lock_performs_atomic_read_modify_write() {
        let counter = Memory::new(0u32);
        counter.with_lock(|n| *n += 1);
        counter.with_lock(|n| *n += 1);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn with_lock_return_value_is_propagated() {
        let list = Memory::new(vec!["a".to_string()]);
        let len = list.with_lock(|v| {
            v.push("b".to_string());
            v.len()
        });
        assert_eq!(len, 2);
    }
}
