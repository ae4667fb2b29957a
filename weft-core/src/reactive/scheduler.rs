//! Flush Scheduler
//!
//! Deferred (`Post`) watchers do not run when their sources change.
//! Instead their identities land in a pending set, and the surrounding
//! application decides when to drain it by calling [`flush_watchers`].
//!
//! The pending set is deduplicating and insertion-ordered: however many
//! times a watcher is triggered between flushes, it appears once and runs
//! once, in first-trigger order.
//!
//! The set is thread-local. The reactive model is single-threaded and
//! cooperative, so "pending" is a property of the logical thread of
//! control that performed the writes; each thread drains the watchers that
//! were deferred on it.

use std::cell::RefCell;

use indexmap::IndexSet;
use tracing::debug;

use super::node::NodeId;
use super::runtime::Runtime;

thread_local! {
    static PENDING: RefCell<IndexSet<NodeId>> = RefCell::new(IndexSet::new());
}

pub(crate) struct Scheduler;

impl Scheduler {
    /// Queue a watcher for the next drain. Re-triggers coalesce.
    pub(crate) fn enqueue(id: NodeId) {
        PENDING.with(|pending| {
            pending.borrow_mut().insert(id);
        });
    }
}

/// Drain the pending set, running each deferred watcher exactly once.
///
/// Takes ownership of the current pending set before running anything:
/// watchers triggered *during* the drain (e.g., a callback that writes to
/// another ref) land in a fresh set and wait for a subsequent call. This
/// keeps a single drain from cascading unboundedly and leaves batching
/// depth under the caller's control.
///
/// Disposed and dropped watchers still present in the set are skipped.
/// Returns the number of callbacks that actually ran; an empty drain
/// returns 0.
pub fn flush_watchers() -> usize {
    let batch = PENDING.with(|pending| std::mem::take(&mut *pending.borrow_mut()));

    let mut flushed = 0;
    for id in batch {
        if let Some(node) = Runtime::lookup(id) {
            if node.run() {
                flushed += 1;
            }
        }
    }

    if flushed > 0 {
        debug!(flushed, "drained deferred watchers");
    }
    flushed
}

/// Number of watchers currently awaiting a flush on this thread.
pub fn pending_watchers() -> usize {
    PENDING.with(|pending| pending.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_with_nothing_pending_returns_zero() {
        assert_eq!(flush_watchers(), 0);
    }

    #[test]
    fn enqueue_coalesces_by_identity() {
        let id = NodeId::new();

        Scheduler::enqueue(id);
        Scheduler::enqueue(id);
        Scheduler::enqueue(id);

        assert_eq!(pending_watchers(), 1);

        // The id resolves to no live node, so the drain skips it.
        assert_eq!(flush_watchers(), 0);
        assert_eq!(pending_watchers(), 0);
    }

    #[test]
    fn drain_clears_the_set() {
        Scheduler::enqueue(NodeId::new());
        Scheduler::enqueue(NodeId::new());
        assert_eq!(pending_watchers(), 2);

        flush_watchers();
        assert_eq!(pending_watchers(), 0);
    }
}
