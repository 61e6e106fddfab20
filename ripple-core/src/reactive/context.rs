//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a node is read, the
//! current computation is registered as its subscriber.
//!
//! # Implementation
//!
//! The runtime keeps a stack of frames. Entering a computation pushes a frame
//! and swaps an empty dependency set into the node; the previous set is kept
//! in the frame. Every read moves the target from the saved set back into the
//! live one. When the computation finishes, whatever is left in the saved set
//! was not read this time, and those edges are removed. That is how a
//! computation stops listening to a branch it no longer takes.
//!
//! Frames nest, so a computed can read another computed that recomputes on
//! demand.

use indexmap::IndexSet;

use super::runtime::{try_with_runtime, with_runtime};
use crate::graph::NodeId;

/// An entry in the reactive context stack.
#[derive(Debug)]
pub(crate) struct Frame {
    /// The running computation, or `None` inside [`untracked`](crate::untracked).
    node: Option<NodeId>,

    /// Dependencies from the previous run that have not been read yet.
    stale: IndexSet<NodeId>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained and stale edges are
/// reconciled even if the computation panics.
pub(crate) struct ReactiveContext {
    node: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given node.
    ///
    /// While this context is active, any node that is read registers `node`
    /// as a subscriber.
    pub(crate) fn enter(node: NodeId) -> Self {
        with_runtime(|rt| {
            let stale = rt.graph.borrow_mut().take_dependencies(node);
            rt.frames.borrow_mut().push(Frame {
                node: Some(node),
                stale,
            });
        });

        Self { node: Some(node) }
    }

    /// Enter a context in which reads are not recorded.
    pub(crate) fn untracked() -> Self {
        with_runtime(|rt| {
            rt.frames.borrow_mut().push(Frame {
                node: None,
                stale: IndexSet::new(),
            });
        });

        Self { node: None }
    }

    /// Check if reads are currently being recorded.
    pub(crate) fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the node whose computation is currently recording reads, if any.
    pub(crate) fn current_subscriber() -> Option<NodeId> {
        with_runtime(|rt| rt.frames.borrow().last().and_then(|frame| frame.node))
    }

    /// Record a read of `target` by the current computation.
    pub(crate) fn track_dependency(target: NodeId) {
        with_runtime(|rt| {
            let reader = {
                let mut frames = rt.frames.borrow_mut();
                let Some(frame) = frames.last_mut() else {
                    return;
                };
                let Some(reader) = frame.node else {
                    return;
                };
                frame.stale.shift_remove(&target);
                reader
            };
            rt.graph.borrow_mut().link(reader, target);
        });
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        try_with_runtime(|rt| {
            let popped = rt.frames.borrow_mut().pop();
            let Some(frame) = popped else {
                return;
            };

            // Verify we're popping the right context.
            debug_assert_eq!(
                frame.node, self.node,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.node, frame.node
            );
            let Some(node) = frame.node else {
                return;
            };

            let mut graph = rt.graph.borrow_mut();
            let mut released = Vec::new();
            for target in frame.stale {
                if graph.forget_path(node, target) {
                    released.push(node);
                }
                graph.unsubscribe(node, target);
            }

            // An effect disposed from inside its own run keeps no edges.
            if graph.get(node).is_some_and(|n| n.disposed) {
                let dependencies: Vec<NodeId> = graph.take_dependencies(node).into_iter().collect();
                for dependency in dependencies {
                    graph.unsubscribe(node, dependency);
                }
            }
            drop(graph);

            rt.ready.borrow_mut().extend(released);
        });
    }
}
