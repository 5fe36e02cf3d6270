//! Atomically published immutable tables.

use parking_lot::RwLock;
use std::sync::Arc;

/// A value replaced wholesale and read as a consistent snapshot.
///
/// Readers clone the inner `Arc` under a short read lock and then work on
/// that snapshot without holding any lock, so a concurrent [`Published::store`]
/// or [`Published::update`] can never be observed half applied.
#[derive(Debug, Default)]
pub struct Published<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Published<T> {
    /// Publish an initial value.
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Replace the value. Snapshots already loaded stay valid.
    pub fn store(&self, value: T) {
        *self.current.write() = Arc::new(value);
    }
}

impl<T: Clone> Published<T> {
    /// Copy the current value, modify the copy and publish it.
    ///
    /// Concurrent updates are serialised; readers see either the old or the
    /// new value.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.current.write();
        let mut next = T::clone(&guard);
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_store() {
        let table = Published::new(vec![1, 2, 3]);
        let before = table.load();
        table.store(vec![4]);
        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*table.load(), vec![4]);
    }

    #[test]
    fn test_update_returns_closure_result() {
        let table = Published::new(vec![1]);
        let len = table.update(|v| {
            v.push(2);
            v.len()
        });
        assert_eq!(len, 2);
        assert_eq!(*table.load(), vec![1, 2]);
    }
}
