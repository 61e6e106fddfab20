//! Error types for the reactive runtime.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised while writing to or recomputing the dependency graph.
///
/// `Compute` errors are contained at the node that produced them: the node
/// keeps its last good value and propagation continues on independent
/// branches. `CycleDetected` aborts the write that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A write was attempted on a computed or effect node.
    #[error("cannot write to readonly node {node}")]
    ReadonlyWrite {
        /// The node that rejected the write.
        node: NodeId,
    },

    /// A user-supplied computation panicked or returned an error.
    #[error("computation of node {node} failed: {message}")]
    Compute {
        /// The node whose computation failed.
        node: NodeId,
        /// The panic payload or the error's `Display` output.
        message: String,
    },

    /// A node was asked to recompute while it was already computing.
    #[error("cycle detected while recomputing node {node}")]
    CycleDetected {
        /// The node that re-entered its own recomputation.
        node: NodeId,
    },
}

impl ReactiveError {
    /// The node the error is attributed to.
    pub fn node(&self) -> NodeId {
        match self {
            Self::ReadonlyWrite { node }
            | Self::Compute { node, .. }
            | Self::CycleDetected { node } => *node,
        }
    }

    /// Whether this error aborts the propagation wave that raised it.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::CycleDetected { .. })
    }
}
