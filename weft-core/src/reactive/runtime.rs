//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects refs, computeds,
//! and watchers. It owns the dependency graph as adjacency sets of node
//! identities and fans out change notifications.
//!
//! # How It Works
//!
//! 1. When a computed or watcher is created, it registers with the runtime.
//!
//! 2. When a ref or computed is read inside a tracking frame, the runtime
//!    records an edge `source -> consumer`.
//!
//! 3. When a ref's value changes, the runtime walks the source's dependent
//!    set in registration order and notifies each dependent: computeds mark
//!    themselves dirty, watchers run or enqueue per their flush mode.
//!
//! # Locking
//!
//! The registry holds weak references so dropped nodes go inert instead of
//! leaking. Dependent sets are insertion-ordered, which is what gives
//! notification its registration-order guarantee. No lock is held while a
//! dependent is notified: notification may recurse into the graph (dirty
//! propagation, sync watcher callbacks), so guards are dropped first.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::node::{Dependent, NodeId};

// Global registry of notifiable nodes (computeds and watchers).
// Weak references avoid keeping dropped nodes alive.
static REGISTRY: OnceLock<DashMap<NodeId, Weak<dyn Dependent>>> = OnceLock::new();

// Adjacency: source node -> ordered set of dependent nodes.
static DEPENDENTS: OnceLock<RwLock<HashMap<NodeId, IndexSet<NodeId>>>> = OnceLock::new();

fn registry() -> &'static DashMap<NodeId, Weak<dyn Dependent>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn dependents() -> &'static RwLock<HashMap<NodeId, IndexSet<NodeId>>> {
    DEPENDENTS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The global reactive runtime.
pub(crate) struct Runtime;

impl Runtime {
    /// Register a notifiable node with the runtime.
    pub(crate) fn register(dependent: Arc<dyn Dependent>) {
        registry().insert(dependent.node_id(), Arc::downgrade(&dependent));
    }

    /// Unregister a node and detach it from every source's dependent set.
    pub(crate) fn unregister(id: NodeId) {
        registry().remove(&id);

        let mut map = dependents().write();
        for set in map.values_mut() {
            set.shift_remove(&id);
        }
    }

    /// Forget a source entirely. Called when the last handle to a ref or
    /// computed is dropped.
    pub(crate) fn drop_source(id: NodeId) {
        dependents().write().remove(&id);
    }

    /// Record that `consumer` depends on `source`.
    ///
    /// First registration wins the ordering slot; re-reads are no-ops.
    pub(crate) fn add_edge(source: NodeId, consumer: NodeId) {
        dependents()
            .write()
            .entry(source)
            .or_default()
            .insert(consumer);
    }

    /// Remove `consumer` from the dependent set of each listed source.
    ///
    /// Called before a computed or watcher re-collects its dependencies,
    /// so edges from the previous run do not linger.
    pub(crate) fn remove_edges(sources: &IndexSet<NodeId>, consumer: NodeId) {
        let mut map = dependents().write();
        for source in sources {
            if let Some(set) = map.get_mut(source) {
                set.shift_remove(&consumer);
            }
        }
    }

    /// Register `source` as a dependency of the active consumer, if any.
    ///
    /// Reads with no tracking frame active register nothing.
    pub(crate) fn track_read(source: NodeId) {
        if let Some(consumer) = ReactiveContext::current_consumer() {
            ReactiveContext::record_read(source);
            Self::add_edge(source, consumer);
        }
    }

    /// Resolve a node id to a live handle, if the node still exists.
    pub(crate) fn lookup(id: NodeId) -> Option<Arc<dyn Dependent>> {
        let weak = registry().get(&id).map(|entry| entry.value().clone())?;
        weak.upgrade()
    }

    /// Number of dependents currently registered against a source.
    pub(crate) fn dependent_count(source: NodeId) -> usize {
        dependents().read().get(&source).map_or(0, |set| set.len())
    }

    /// Notify every dependent of `source`, in registration order.
    ///
    /// This is the core update propagation mechanism. The adjacency lock is
    /// released before any dependent runs, because notification can recurse
    /// back into the graph.
    pub(crate) fn notify_dependents(source: NodeId) {
        let ids: SmallVec<[NodeId; 8]> = {
            let map = dependents().read();
            match map.get(&source) {
                Some(set) if !set.is_empty() => set.iter().copied().collect(),
                _ => return,
            }
        };

        for id in ids {
            if let Some(dependent) = Self::lookup(id) {
                dependent.notify();
            }
        }
    }
}
