//! Node identity for the dependency graph.
//!
//! Refs, computeds, and watchers all draw their identity from a single
//! `NodeId` space, so adjacency sets can refer to any of them uniformly
//! and edge removal is a bounded set operation on plain identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a node in the dependency graph.
///
/// Each reactive value (ref, computed, or watcher) gets a unique ID when
/// created. Uses an atomic counter to ensure uniqueness across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A node that can react to a change in one of its dependencies.
///
/// Implemented by computeds (which mark themselves dirty and propagate the
/// invalidation) and watchers (which run or enqueue their callback). The
/// write-time fan-out goes through this interface so `Ref::set` never has
/// to distinguish node kinds.
pub(crate) trait Dependent: Send + Sync {
    /// The node's identity in the dependency graph.
    fn node_id(&self) -> NodeId;

    /// React to an upstream change.
    fn notify(&self);

    /// Execute this node's side effect, if any. Invoked by the flush drain.
    /// Returns whether a callback actually ran.
    fn run(&self) -> bool;
}

/// Read access to a node's identity, for explicit watcher source lists.
///
/// Implemented by [`Ref`](crate::reactive::Ref) and
/// [`Computed`](crate::reactive::Computed).
pub trait ReactiveSource {
    /// The node's identity in the dependency graph.
    fn node_id(&self) -> NodeId;
}
