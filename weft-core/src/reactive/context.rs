//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a ref or computed is
//! read, we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames to track the currently executing
//! computation. When entering a reactive context (e.g., evaluating a
//! computed or running a watcher callback), we push a frame onto the stack.
//! When the computation completes, we pop it.
//!
//! Frames carry a kind. A `Compute` frame is a pure evaluation: while any
//! such frame is on the stack, writes to refs are rejected. An `Effect`
//! frame is a watcher callback: reads are tracked, writes are allowed. An
//! `Untracked` frame is a barrier: reads below it register nothing.
//!
//! Nested contexts are supported (e.g., a computed that reads from another
//! computed); only the innermost frame collects new reads.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::node::NodeId;

thread_local! {
    static FRAME_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// What kind of execution a tracking frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A pure evaluation (computed recomputation, or a read-only pass run
    /// by the calling layer). Ref writes fail while one is active.
    Compute,

    /// A watcher callback. Reads are tracked; writes are allowed.
    Effect,

    /// A barrier frame. Reads register no dependencies.
    Untracked,
}

/// An entry in the reactive context stack.
#[derive(Debug)]
struct Frame {
    /// The consumer collecting reads, or `None` for a barrier frame.
    consumer: Option<NodeId>,

    /// What kind of execution this frame represents.
    kind: FrameKind,

    /// Sources read during this frame, in first-read order.
    reads: IndexSet<NodeId>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the frame stack is properly maintained even if the
/// computation panics.
pub struct ReactiveContext {
    consumer: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given consumer.
    ///
    /// While this context is active, any reactive reads will be attributed
    /// to `consumer`. The context is exited when the returned guard drops.
    pub fn enter(consumer: NodeId, kind: FrameKind) -> Self {
        debug_assert_ne!(
            kind,
            FrameKind::Untracked,
            "use enter_untracked() for barrier frames"
        );
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                consumer: Some(consumer),
                kind,
                reads: IndexSet::new(),
            });
        });

        Self {
            consumer: Some(consumer),
        }
    }

    /// Enter a barrier frame: reads inside it register no dependencies.
    pub fn enter_untracked() -> Self {
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                consumer: None,
                kind: FrameKind::Untracked,
                reads: IndexSet::new(),
            });
        });

        Self { consumer: None }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        FRAME_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the consumer reads are currently attributed to, if any.
    ///
    /// Returns `None` with an empty stack or below a barrier frame.
    pub fn current_consumer() -> Option<NodeId> {
        FRAME_STACK.with(|stack| stack.borrow().last().and_then(|frame| frame.consumer))
    }

    /// Record a read of the given source in the innermost frame.
    ///
    /// This is called by reactive sources when they are read. Barrier
    /// frames and an empty stack swallow the read.
    pub fn record_read(source: NodeId) {
        FRAME_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if frame.consumer.is_some() {
                    frame.reads.insert(source);
                }
            }
        });
    }

    /// Get the reads collected in the innermost frame so far.
    pub fn current_reads() -> IndexSet<NodeId> {
        FRAME_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.reads.clone())
                .unwrap_or_default()
        })
    }

    /// Check whether a pure evaluation is anywhere on the stack.
    ///
    /// Ref writes must fail while this holds, no matter how deeply nested
    /// the write attempt is.
    pub fn is_compute_active() -> bool {
        FRAME_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|frame| frame.kind == FrameKind::Compute)
        })
    }

    /// Check whether `id` is already evaluating somewhere on the stack.
    ///
    /// A computed finding itself here has a circular dependency.
    pub(crate) fn on_stack(id: NodeId) -> bool {
        FRAME_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|frame| frame.consumer == Some(id))
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        FRAME_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right frame. This helps catch bugs
            // where contexts are mismatched.
            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.consumer, self.consumer,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.consumer, frame.consumer
                );
            }
        });
    }
}

/// Run `f` without registering any dependencies for reads inside it.
///
/// Useful for one-off inspection of reactive state from within a tracked
/// computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _barrier = ReactiveContext::enter_untracked();
    f()
}
