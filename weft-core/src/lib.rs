//! Weft Core
//!
//! This crate provides the reactive state core for the Weft terminal UI
//! framework. It implements:
//!
//! - Reactive primitives (refs, computeds, watchers)
//! - Automatic dependency tracking
//! - A two-tier flush scheduler (inline vs. batched watcher execution)
//!
//! The component/template layer, directives, and the terminal rendering
//! backend build on this crate and drive it through a deliberately small
//! surface: create a cell, read/write it, define a derived computation,
//! register a watcher with a flush mode, and drain the pending watchers.
//!
//! # Architecture
//!
//! - `reactive`: the primitives, the tracking context, and the runtime
//!   that owns the dependency graph
//! - `error`: the typed errors raised for framework misuse (writes during
//!   a pure evaluation, circular dependencies)
//!
//! # Concurrency
//!
//! The model is single-threaded and cooperative: every operation is a
//! synchronous call, and "deferred" watchers are logical batching, not
//! background execution. Types are `Send + Sync`, but a multi-threaded
//! caller must serialize access to the graph externally; per-node locks
//! cannot make a multi-ref transition atomic.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{flush_watchers, Computed, FlushMode, Ref, Watcher};
//!
//! let count = Ref::new(0);
//!
//! let count_read = count.clone();
//! let doubled = Computed::new(move || count_read.get() * 2);
//!
//! let _watcher = Watcher::with_sources(
//!     &[&count],
//!     || println!("count changed"),
//!     FlushMode::Post,
//! );
//!
//! count.set(5)?;
//! assert_eq!(doubled.get()?, 10);
//! assert_eq!(flush_watchers(), 1); // prints: "count changed"
//! ```

pub mod error;
pub mod reactive;

pub use error::ReactiveError;
pub use reactive::{
    flush_watchers, pending_watchers, untracked, Computed, FlushMode, FrameKind, NodeId,
    ReactiveContext, ReactiveSource, Ref, Watcher,
};
