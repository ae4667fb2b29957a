//! Watcher Implementation
//!
//! A Watcher is a side-effecting callback bound to one or more reactive
//! sources. Watchers are always leaves of the dependency graph: nothing
//! depends on them.
//!
//! # Flush Modes
//!
//! - [`FlushMode::Sync`]: on any triggering write, the callback runs
//!   immediately, before `set` returns, in the order watchers registered
//!   against that source.
//! - [`FlushMode::Post`]: triggers insert the watcher into the pending
//!   set; the callback does not run until the application drains it with
//!   [`flush_watchers`](crate::reactive::flush_watchers). However many
//!   triggers arrive between drains, the callback runs once per drain.
//!
//! # Sources
//!
//! A watcher registered without sources discovers them by running its
//! callback once at creation inside a tracking frame, exactly like a
//! computed, and re-collects them on every run (so conditional reads stay
//! accurate). A watcher registered with an explicit source list reacts to
//! those sources only; its callback runs behind a barrier and reads inside
//! it bind nothing.
//!
//! # Disposal
//!
//! A disposed watcher is detached from every source, is never enqueued,
//! and is filtered out of the pending set at drain time. Dropping the last
//! handle to a watcher disposes it implicitly: the runtime only holds a
//! weak reference.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::trace;

use super::context::{FrameKind, ReactiveContext};
use super::node::{Dependent, NodeId, ReactiveSource};
use super::runtime::Runtime;
use super::scheduler::Scheduler;

/// When a triggered watcher's callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Run inline, before the triggering write returns.
    Sync,

    /// Defer to the next [`flush_watchers`](crate::reactive::flush_watchers)
    /// drain, coalescing repeated triggers.
    Post,
}

struct WatcherInner {
    /// Identity of this watcher in the dependency graph.
    id: NodeId,

    /// The side-effect callback.
    callback: Box<dyn Fn() + Send + Sync>,

    /// When the callback runs relative to the triggering write.
    mode: FlushMode,

    /// Whether the source list was given explicitly (fixed) or is
    /// re-discovered from reads on every run.
    explicit_sources: bool,

    /// Sources this watcher is currently bound to.
    dependencies: Mutex<IndexSet<NodeId>>,

    /// Whether the watcher has been disposed.
    disposed: AtomicBool,

    /// Number of times the callback has run.
    runs: AtomicU64,
}

impl WatcherInner {
    /// Run the callback, re-collecting dependencies for implicit watchers.
    fn execute(&self) -> bool {
        if self.disposed.load(Ordering::SeqCst) {
            return false;
        }

        if self.explicit_sources {
            // Fixed source list: reads inside the callback bind nothing.
            let _barrier = ReactiveContext::enter_untracked();
            (self.callback)();
        } else {
            // Clear old dependencies, then track fresh ones while running.
            let previous = std::mem::take(&mut *self.dependencies.lock());
            Runtime::remove_edges(&previous, self.id);

            let reads;
            {
                let _ctx = ReactiveContext::enter(self.id, FrameKind::Effect);
                (self.callback)();
                reads = ReactiveContext::current_reads();
            }
            *self.dependencies.lock() = reads;
        }

        self.runs.fetch_add(1, Ordering::SeqCst);
        true
    }
}

impl Dependent for WatcherInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn notify(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        match self.mode {
            FlushMode::Sync => {
                self.execute();
            }
            FlushMode::Post => Scheduler::enqueue(self.id),
        }
    }

    fn run(&self) -> bool {
        self.execute()
    }
}

impl Drop for WatcherInner {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// A registered side-effect bound to one or more reactive sources.
///
/// Cloning a `Watcher` creates a new handle to the **same** watcher.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0);
/// let count_read = count.clone();
///
/// let watcher = Watcher::new(
///     move || println!("count is {}", count_read.get()),
///     FlushMode::Sync,
/// );
///
/// count.set(5)?; // prints: "count is 5"
/// ```
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    /// Register a watcher with implicit sources.
    ///
    /// The callback runs once immediately to establish its dependency set;
    /// every subsequent run re-collects it from the reads it performs.
    pub fn new<F>(callback: F, mode: FlushMode) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(WatcherInner {
            id: NodeId::new(),
            callback: Box::new(callback),
            mode,
            explicit_sources: false,
            dependencies: Mutex::new(IndexSet::new()),
            disposed: AtomicBool::new(false),
            runs: AtomicU64::new(0),
        });

        Runtime::register(Arc::clone(&inner) as Arc<dyn Dependent>);

        // Establish the initial dependency set.
        inner.execute();

        Self { inner }
    }

    /// Register a watcher against an explicit list of sources.
    ///
    /// The callback does not run at registration; it runs only when one of
    /// the listed sources changes. Reads inside the callback bind nothing.
    pub fn with_sources<F>(sources: &[&dyn ReactiveSource], callback: F, mode: FlushMode) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let dependencies: IndexSet<NodeId> =
            sources.iter().map(|source| source.node_id()).collect();

        let inner = Arc::new(WatcherInner {
            id: NodeId::new(),
            callback: Box::new(callback),
            mode,
            explicit_sources: true,
            dependencies: Mutex::new(dependencies.clone()),
            disposed: AtomicBool::new(false),
            runs: AtomicU64::new(0),
        });

        Runtime::register(Arc::clone(&inner) as Arc<dyn Dependent>);

        for source in dependencies {
            Runtime::add_edge(source, inner.id);
        }

        Self { inner }
    }

    /// Get the watcher's identity in the dependency graph.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The watcher's flush mode.
    pub fn flush_mode(&self) -> FlushMode {
        self.inner.mode
    }

    /// Stop the watcher.
    ///
    /// Detaches it from every source's dependent set. A disposed watcher
    /// is never enqueued again, and one already sitting in the pending set
    /// is skipped (and uncounted) at drain time.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            let dependencies = std::mem::take(&mut *self.inner.dependencies.lock());
            Runtime::remove_edges(&dependencies, self.inner.id);
            trace!(id = self.inner.id.raw(), "watcher disposed");
        }
    }

    /// Check if the watcher has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of times the callback has run.
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// Number of sources the watcher is currently bound to.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl Clone for Watcher {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("mode", &self.inner.mode)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::cell::Ref;
    use super::super::scheduler::{flush_watchers, pending_watchers};
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn implicit_watcher_runs_on_creation() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let _watcher = Watcher::new(
            move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            FlushMode::Sync,
        );

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_watcher_does_not_run_on_creation() {
        let cell = Ref::new(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::with_sources(
            &[&cell],
            move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            FlushMode::Sync,
        );

        assert_eq!(watcher.run_count(), 0);
        assert_eq!(watcher.dependency_count(), 1);

        cell.set(1).unwrap();
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn implicit_watcher_tracks_reads() {
        let cell = Ref::new(0);
        let cell_read = cell.clone();

        let observed = Arc::new(AtomicI32::new(-1));
        let observed_clone = observed.clone();

        let watcher = Watcher::new(
            move || {
                observed_clone.store(cell_read.get(), Ordering::SeqCst);
            },
            FlushMode::Sync,
        );

        // Initial run captured the current value and the dependency.
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert_eq!(watcher.dependency_count(), 1);

        // A sync trigger observes the updated value before set returns.
        cell.set(42).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn implicit_watcher_rebinds_on_every_run() {
        let use_left = Ref::new(true);
        let left = Ref::new(0);
        let right = Ref::new(0);

        let (use_left_read, left_read, right_read) =
            (use_left.clone(), left.clone(), right.clone());

        let watcher = Watcher::new(
            move || {
                if use_left_read.get() {
                    let _ = left_read.get();
                } else {
                    let _ = right_read.get();
                }
            },
            FlushMode::Sync,
        );
        assert_eq!(watcher.run_count(), 1);

        // Switch branches; the watcher now reads `right` instead.
        use_left.set(false).unwrap();
        assert_eq!(watcher.run_count(), 2);

        // The abandoned branch no longer triggers.
        left.set(7).unwrap();
        assert_eq!(watcher.run_count(), 2);

        right.set(7).unwrap();
        assert_eq!(watcher.run_count(), 3);
    }

    #[test]
    fn explicit_watcher_reads_bind_nothing() {
        let source = Ref::new(0);
        let probed = Ref::new(0);
        let probed_read = probed.clone();

        let watcher = Watcher::with_sources(
            &[&source],
            move || {
                let _ = probed_read.get();
            },
            FlushMode::Sync,
        );

        source.set(1).unwrap();
        assert_eq!(watcher.run_count(), 1);

        // The read inside the callback did not subscribe to `probed`.
        probed.set(1).unwrap();
        assert_eq!(watcher.run_count(), 1);
        assert_eq!(probed.dependent_count(), 0);
    }

    #[test]
    fn post_watcher_waits_for_flush() {
        let cell = Ref::new(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::with_sources(
            &[&cell],
            move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            FlushMode::Post,
        );

        cell.set(1).unwrap();
        assert_eq!(watcher.run_count(), 0);
        assert_eq!(pending_watchers(), 1);

        assert_eq!(flush_watchers(), 1);
        assert_eq!(watcher.run_count(), 1);
        assert_eq!(pending_watchers(), 0);
    }

    #[test]
    fn disposed_watcher_never_runs() {
        let cell = Ref::new(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::with_sources(
            &[&cell],
            move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            FlushMode::Sync,
        );

        cell.set(1).unwrap();
        assert_eq!(watcher.run_count(), 1);

        watcher.dispose();
        assert!(watcher.is_disposed());
        assert_eq!(cell.dependent_count(), 0);

        cell.set(2).unwrap();
        cell.set(3).unwrap();
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn dispose_filters_already_pending_watcher() {
        let cell = Ref::new(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::with_sources(
            &[&cell],
            move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            FlushMode::Post,
        );

        cell.set(1).unwrap();
        assert_eq!(pending_watchers(), 1);

        // Disposed after being queued: the drain must skip it.
        watcher.dispose();
        assert_eq!(flush_watchers(), 0);
        assert_eq!(watcher.run_count(), 0);
    }

    #[test]
    fn dropped_watcher_goes_inert() {
        let cell = Ref::new(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let watcher = Watcher::with_sources(
            &[&cell],
            move || {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            FlushMode::Post,
        );

        cell.set(1).unwrap();
        drop(watcher);

        // The pending entry resolves to nothing at drain time.
        assert_eq!(flush_watchers(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clone_shares_state() {
        let watcher1 = Watcher::new(|| {}, FlushMode::Sync);
        let watcher2 = watcher1.clone();

        assert_eq!(watcher1.id(), watcher2.id());
        assert_eq!(watcher1.run_count(), 1);

        watcher1.dispose();
        assert!(watcher2.is_disposed());
    }
}
