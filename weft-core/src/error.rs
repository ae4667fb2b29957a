//! Error types for the reactive core.

use thiserror::Error;

use crate::reactive::NodeId;

/// Errors raised by the reactive core.
///
/// Both conditions signal a usage bug in the calling layer. The core never
/// retries or recovers from them internally; they propagate to the
/// immediate caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A ref write was attempted while a pure evaluation was running.
    ///
    /// The write did not happen; allowing it would make dependency
    /// tracking during the same pass unreliable.
    #[error("ref {id:?} written while a computed evaluation is in progress")]
    WriteDuringCompute {
        /// The ref that rejected the write.
        id: NodeId,
    },

    /// A computed transitively reads its own value.
    #[error("computed {id:?} depends on itself")]
    CircularDependency {
        /// The computed that was found on its own evaluation stack.
        id: NodeId,
    },
}
