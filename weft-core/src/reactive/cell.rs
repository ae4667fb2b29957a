//! Ref Implementation
//!
//! A Ref is the fundamental reactive primitive. It holds a mutable value
//! and tracks which computations depend on it.
//!
//! # How Refs Work
//!
//! 1. When a ref is read within a tracking frame (computed/watcher), the
//!    ref registers that frame's consumer as a dependent.
//!
//! 2. When a ref's value changes, all dependents are notified in the order
//!    they registered: computeds are marked dirty (they recompute lazily on
//!    their next read), sync watchers run before `set` returns, post
//!    watchers are queued for the next flush.
//!
//! 3. Writing a value the equality function considers unchanged is a
//!    no-op: no dependents are notified, no dirtying occurs.
//!
//! # Equality
//!
//! The comparator is pluggable per ref. [`Ref::new`] uses `PartialEq`;
//! [`Ref::with_equality`] accepts a custom function, which lets the owner
//! treat representationally different values as equal (e.g., comparing a
//! struct by a single field).

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::ReactiveError;

use super::context::ReactiveContext;
use super::node::{NodeId, ReactiveSource};
use super::runtime::Runtime;

type EqualityFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

struct RefInner<T> {
    /// Identity of this ref in the dependency graph.
    id: NodeId,

    /// The current value.
    value: RwLock<T>,

    /// Decides whether a write actually changed the value.
    equals: EqualityFn<T>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        Runtime::drop_source(self.id);
    }
}

/// A reactive mutable cell holding a value of type `T`.
///
/// Cloning a `Ref` creates a new handle to the **same** cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies dependents)
/// count.set(5)?;
/// ```
pub struct Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<RefInner<T>>,
}

impl<T> Ref<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new ref with the given initial value, compared with `==`.
    pub fn new(value: T) -> Self {
        Self::with_equality(value, |a, b| a == b)
    }
}

impl<T> Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new ref with a custom equality function.
    ///
    /// Writes for which `equals` reports the old and new value equal are
    /// dropped without notifying anyone.
    pub fn with_equality<F>(value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(RefInner {
                id: NodeId::new(),
                value: RwLock::new(value),
                equals: Arc::new(equals),
            }),
        }
    }

    /// Get the ref's identity in the dependency graph.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a tracking frame, this also registers the ref as a
    /// dependency of the current consumer.
    pub fn get(&self) -> T {
        Runtime::track_read(self.inner.id);
        self.inner.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify dependents.
    ///
    /// If the equality function reports the value unchanged, nothing
    /// happens. Otherwise the value is stored first, then dependents are
    /// notified in registration order: sync watchers run before this call
    /// returns, and so observe the updated value.
    ///
    /// # Errors
    ///
    /// Returns [`ReactiveError::WriteDuringCompute`] (without mutating)
    /// when a pure evaluation is in progress anywhere on this thread's
    /// tracking stack.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        if ReactiveContext::is_compute_active() {
            return Err(ReactiveError::WriteDuringCompute { id: self.inner.id });
        }

        {
            let mut guard = self.inner.value.write();
            if (self.inner.equals)(&*guard, &value) {
                trace!(id = self.inner.id.raw(), "write skipped, value unchanged");
                return Ok(());
            }
            *guard = value;
        }

        // Value lock is released before fan-out: sync watchers may read
        // this ref from their callbacks.
        Runtime::notify_dependents(self.inner.id);
        Ok(())
    }

    /// Update the value using a function of the current value.
    ///
    /// Equality short-circuiting and notification behave exactly as in
    /// [`set`](Ref::set).
    pub fn update<F>(&self, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&*guard)
        };
        self.set(new_value)
    }

    /// Number of computeds and watchers currently depending on this ref.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.inner.id)
    }
}

impl<T> Clone for Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ReactiveSource for Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.inner.id
    }
}

impl<T> Debug for Ref<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::context::FrameKind;
    use super::*;

    #[test]
    fn ref_get_and_set() {
        let cell = Ref::new(0);
        assert_eq!(cell.get(), 0);

        cell.set(42).unwrap();
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn ref_update() {
        let cell = Ref::new(10);
        cell.update(|v| v + 5).unwrap();
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn ref_clone_shares_state() {
        let cell1 = Ref::new(0);
        let cell2 = cell1.clone();

        cell1.set(42).unwrap();
        assert_eq!(cell2.get(), 42);

        cell2.set(100).unwrap();
        assert_eq!(cell1.get(), 100);
    }

    #[test]
    fn ref_ids_are_unique() {
        let a = Ref::new(0);
        let b = Ref::new(0);
        let c = Ref::new(0);

        assert_ne!(a.id(), b.id());
        assert_ne!(b.id(), c.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn tracked_read_registers_edge() {
        let cell = Ref::new(1);
        let consumer = NodeId::new();

        {
            let _ctx = ReactiveContext::enter(consumer, FrameKind::Compute);
            let _ = cell.get();
        }

        assert_eq!(cell.dependent_count(), 1);
    }

    #[test]
    fn untracked_read_registers_nothing() {
        let cell = Ref::new(1);
        let consumer = NodeId::new();

        {
            let _ctx = ReactiveContext::enter(consumer, FrameKind::Compute);
            let _ = cell.get_untracked();
        }

        assert_eq!(cell.dependent_count(), 0);
    }

    #[test]
    fn read_outside_any_frame_registers_nothing() {
        let cell = Ref::new(1);
        let _ = cell.get();
        assert_eq!(cell.dependent_count(), 0);
    }

    #[test]
    fn write_rejected_during_compute_frame() {
        let cell = Ref::new(5);

        let err = {
            let _ctx = ReactiveContext::enter(NodeId::new(), FrameKind::Compute);
            cell.set(6).unwrap_err()
        };

        assert!(matches!(err, ReactiveError::WriteDuringCompute { .. }));
        // The rejected write did not mutate.
        assert_eq!(cell.get(), 5);
    }

    #[test]
    fn write_allowed_during_effect_frame() {
        let cell = Ref::new(5);

        {
            let _ctx = ReactiveContext::enter(NodeId::new(), FrameKind::Effect);
            cell.set(6).unwrap();
        }

        assert_eq!(cell.get(), 6);
    }

    #[test]
    fn custom_equality_short_circuits() {
        #[derive(Clone, Debug)]
        struct Version {
            major: u32,
            build: &'static str,
        }

        // Two versions are the same release if the major number matches,
        // whatever the build string says.
        let release = Ref::with_equality(
            Version {
                major: 1,
                build: "a",
            },
            |a, b| a.major == b.major,
        );

        release
            .set(Version {
                major: 1,
                build: "b",
            })
            .unwrap();

        // Write was dropped: the old representation survives.
        assert_eq!(release.get().build, "a");

        release
            .set(Version {
                major: 2,
                build: "c",
            })
            .unwrap();
        assert_eq!(release.get().major, 2);
    }
}
