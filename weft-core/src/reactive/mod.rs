//! Reactive Primitives
//!
//! This module implements the core reactive system: refs, computeds, and
//! watchers. These primitives form the foundation of Weft's fine-grained
//! reactivity.
//!
//! # Concepts
//!
//! ## Refs
//!
//! A [`Ref`] is a container for mutable state. When a ref's value is read
//! within a tracking context (such as a computed or watcher), the ref
//! automatically registers that context as a dependent. When the ref's
//! value actually changes (writes of equal values are dropped), all
//! dependents are notified in registration order.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result. Upstream
//! changes mark it dirty eagerly but it re-evaluates only when read, so
//! several writes before a read cost a single recomputation.
//!
//! ## Watchers
//!
//! A [`Watcher`] is a side-effecting callback bound to reactive sources.
//! Its [`FlushMode`] decides whether it runs inline with the triggering
//! write or waits, deduplicated, for an explicit [`flush_watchers`] drain.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking stack to automatically
//! detect dependencies. When a ref or computed is read, we check if there
//! is an active tracking frame and, if so, register the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.
//!
//! The dependency graph itself lives in the runtime as adjacency sets of
//! node identities, so edge removal is a bounded set operation and no
//! cyclic ownership exists between primitives.

mod cell;
mod computed;
mod context;
mod node;
mod runtime;
mod scheduler;
mod watcher;

pub use cell::Ref;
pub use computed::Computed;
pub use context::{untracked, FrameKind, ReactiveContext};
pub use node::{NodeId, ReactiveSource};
pub use scheduler::{flush_watchers, pending_watchers};
pub use watcher::{FlushMode, Watcher};
