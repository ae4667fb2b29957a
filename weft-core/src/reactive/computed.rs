//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies has changed, and only when somebody reads it.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its computation inside a tracking
//!    frame and caches the result. Every reactive read during the run
//!    becomes a dependency edge.
//!
//! 2. When a dependency changes, the computed is marked dirty. Nothing is
//!    recomputed at that point; the dirty flag is pushed eagerly through
//!    dependent computeds, and dependent watchers are notified.
//!
//! 3. The next read finds the dirty flag, drops the previous run's edges,
//!    re-evaluates, re-collects edges, and caches the fresh value.
//!
//! This "push invalidation, pull recomputation" split means several
//! upstream writes before a read cost one recomputation, and computeds
//! nobody reads cost nothing at all.
//!
//! # Failure
//!
//! Evaluation is pure: writing a ref from inside a computation fails (see
//! the crate error type), and a computed that transitively reads itself
//! fails with a circular-dependency error instead of overflowing the
//! stack. A failed evaluation caches nothing and stays dirty.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::error::ReactiveError;

use super::context::{FrameKind, ReactiveContext};
use super::node::{Dependent, NodeId, ReactiveSource};
use super::runtime::Runtime;

type ComputeFn<T> = Arc<dyn Fn() -> Result<T, ReactiveError> + Send + Sync>;

struct ComputedInner<T> {
    /// Identity of this computed in the dependency graph.
    id: NodeId,

    /// The computation function.
    compute: ComputeFn<T>,

    /// The cached value (`None` until the first successful evaluation).
    value: RwLock<Option<T>>,

    /// Whether the cached value is stale. Starts true: never computed.
    dirty: AtomicBool,

    /// Sources read during the most recent evaluation. Replaced wholesale
    /// each run, never merged.
    dependencies: Mutex<IndexSet<NodeId>>,

    /// Number of times the computation function has run.
    recomputations: AtomicU64,
}

impl<T> ComputedInner<T> {
    /// Mark stale and, on the clean-to-dirty transition, push the
    /// invalidation to dependents. An already-dirty computed stops the
    /// propagation: everything downstream was dirtied the first time.
    fn mark_dirty(&self) {
        if !self.dirty.swap(true, Ordering::SeqCst) {
            Runtime::notify_dependents(self.id);
        }
    }
}

impl<T> Dependent for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn notify(&self) {
        self.mark_dirty();
    }

    fn run(&self) -> bool {
        // Computeds have no side effect to drain.
        false
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
        Runtime::drop_source(self.id);
    }
}

/// A cached derived value that recomputes lazily when dependencies change.
///
/// Cloning a `Computed` creates a new handle to the **same** node.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(2);
/// let count_read = count.clone();
/// let doubled = Computed::new(move || count_read.get() * 2);
///
/// assert_eq!(doubled.get()?, 4);
/// count.set(5)?;
/// assert_eq!(doubled.get()?, 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new computed from an infallible computation.
    ///
    /// The computation is not run immediately; it runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::try_new(move || Ok(compute()))
    }

    /// Create a new computed from a fallible computation.
    ///
    /// This is the variant to use when the computation reads other
    /// computeds: their reads return `Result`, which `?` propagates out of
    /// the evaluation.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T, ReactiveError> + Send + Sync + 'static,
    {
        let inner = Arc::new(ComputedInner {
            id: NodeId::new(),
            compute: Arc::new(compute),
            value: RwLock::new(None),
            dirty: AtomicBool::new(true),
            dependencies: Mutex::new(IndexSet::new()),
            recomputations: AtomicU64::new(0),
        });

        Runtime::register(Arc::clone(&inner) as Arc<dyn Dependent>);

        Self { inner }
    }

    /// Get the computed's identity in the dependency graph.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// A clean read returns the cache and still registers this computed as
    /// a dependency of the active consumer, since a computed can itself be
    /// depended upon.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::CircularDependency`] if this computed is already
    /// evaluating somewhere on the tracking stack, or any error the
    /// computation itself propagates.
    pub fn get(&self) -> Result<T, ReactiveError> {
        self.read(true)
    }

    /// Get the current value without registering a dependency.
    ///
    /// Still recomputes if dirty; the cycle check still applies.
    pub fn get_untracked(&self) -> Result<T, ReactiveError> {
        self.read(false)
    }

    fn read(&self, track: bool) -> Result<T, ReactiveError> {
        let inner = &self.inner;

        if ReactiveContext::on_stack(inner.id) {
            return Err(ReactiveError::CircularDependency { id: inner.id });
        }

        if track {
            Runtime::track_read(inner.id);
        }

        if inner.dirty.load(Ordering::SeqCst) {
            self.recompute()?;
        }

        Ok(inner
            .value
            .read()
            .clone()
            .expect("clean computed holds a cached value"))
    }

    /// Re-evaluate the computation inside a tracking frame.
    ///
    /// Edges from the previous run are dropped first, so branches the new
    /// run never takes stop invalidating us. On failure the collected
    /// edges stay installed and the dirty flag stays set; nothing is
    /// cached.
    fn recompute(&self) -> Result<(), ReactiveError> {
        let inner = &self.inner;

        let previous = std::mem::take(&mut *inner.dependencies.lock());
        Runtime::remove_edges(&previous, inner.id);

        let result;
        let reads;
        {
            let _ctx = ReactiveContext::enter(inner.id, FrameKind::Compute);
            result = (inner.compute)();
            reads = ReactiveContext::current_reads();
        }
        *inner.dependencies.lock() = reads;
        inner.recomputations.fetch_add(1, Ordering::SeqCst);

        let value = result?;
        *inner.value.write() = Some(value);
        inner.dirty.store(false, Ordering::SeqCst);
        trace!(id = inner.id.raw(), "computed revalidated");
        Ok(())
    }

    /// Force invalidation. The next read recomputes.
    ///
    /// Propagates to dependents exactly like an upstream change.
    pub fn invalidate(&self) {
        self.inner.mark_dirty();
    }

    /// Whether the cached value is stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Number of times the computation function has run.
    ///
    /// This is the observable surface of the caching contract: repeated
    /// reads without upstream changes leave it untouched.
    pub fn recomputations(&self) -> u64 {
        self.inner.recomputations.load(Ordering::SeqCst)
    }

    /// Number of sources the most recent evaluation read.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Number of computeds and watchers depending on this computed.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.inner.id)
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ReactiveSource for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.inner.id
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .field("recomputations", &self.recomputations())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
