//! Update Scheduler
//!
//! Bookkeeping half of the propagation engine. A write is propagated in two
//! phases:
//!
//! 1. **Mark.** Starting from the written signal, every reachable subscriber
//!    gets `pending += 1`. A node forwards the mark to each subscriber only
//!    once per wave and remembers which ones it counted, so each node ends up
//!    with one increment per marked dependency.
//!
//! 2. **Sweep.** Walking outward from the written signals, each visit to a
//!    node resolves one of its marked paths. When the count reaches zero every
//!    dependency has settled and the node is recomputed at most once, then the
//!    walk continues into the subscribers it counted. Edges created during the
//!    wave are never walked: the reader that created one already pulled a
//!    fresh value through it.
//!
//! The sweep loop itself lives in the runtime because recomputation runs user
//! code, which must never execute while the graph is borrowed. This module
//! provides the borrow-scoped steps that loop is built from.

use indexmap::IndexSet;

use super::arena::Graph;
use super::node::{Node, NodeId};
use crate::error::ReactiveError;

/// Outcome of resolving one marked path into a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Other marked paths into the node are still open, or the node is not
    /// part of this wave.
    Waiting,

    /// All paths resolved. `recompute` is set when a dependency changed;
    /// `subscribers` are the paths this node marked and now has to resolve.
    Ready {
        recompute: bool,
        subscribers: IndexSet<NodeId>,
    },
}

impl Graph {
    /// Mark phase, run once per written signal per wave.
    ///
    /// Each node forwards the mark to the subscribers it has not counted yet
    /// and records them in `marked`, so every increment has exactly one
    /// matching resolution. Every node whose count leaves zero is appended to
    /// `touched` so the wave can be reset if it aborts.
    pub(crate) fn mark(&mut self, root: NodeId, touched: &mut Vec<NodeId>) {
        if let Some(node) = self.get_mut(root) {
            node.requires_update = true;
        }

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            node.pending += 1;
            if node.pending == 1 {
                touched.push(id);
            }

            let unmarked: Vec<NodeId> = node
                .subscribers
                .iter()
                .filter(|subscriber| !node.marked.contains(*subscriber))
                .copied()
                .collect();
            node.marked.extend(unmarked.iter().copied());
            // Reversed so the first subscriber is marked first.
            stack.extend(unmarked.into_iter().rev());
        }

        tracing::trace!(node = %root, touched = touched.len(), "marked");
    }

    /// Resolve one marked path into `id` under write `epoch`.
    ///
    /// Fails with [`ReactiveError::CycleDetected`] when the node is ready to
    /// recompute but is already computing.
    pub(crate) fn resolve(&mut self, id: NodeId, epoch: u64) -> Result<Step, ReactiveError> {
        let Some(node) = self.get_mut(id) else {
            return Ok(Step::Waiting);
        };
        if node.pending == 0 {
            return Ok(Step::Waiting);
        }

        node.pending -= 1;
        if node.pending > 0 {
            return Ok(Step::Waiting);
        }
        release(node, id, epoch)
    }

    /// Account for a marked path that disappeared before the sweep reached it.
    ///
    /// Called when `reader` stops reading `target`. Only a path that `target`
    /// itself marked is resolved. Returns `true` when that was the reader's
    /// last open path; the reader then has to be settled through
    /// [`Graph::take_ready`].
    pub(crate) fn forget_path(&mut self, reader: NodeId, target: NodeId) -> bool {
        let counted = self
            .get_mut(target)
            .is_some_and(|node| node.marked.shift_remove(&reader));
        if !counted {
            return false;
        }
        let Some(node) = self.get_mut(reader) else {
            return false;
        };
        if node.pending == 0 {
            return false;
        }
        node.pending -= 1;
        node.pending == 0
    }

    /// Resolve every path a released node still owed its subscribers.
    ///
    /// Returns the subscribers left with no open path.
    pub(crate) fn forget_marks(&mut self, id: NodeId) -> Vec<NodeId> {
        let marked = self
            .get_mut(id)
            .map(|node| std::mem::take(&mut node.marked))
            .unwrap_or_default();

        let mut released = Vec::new();
        for subscriber in marked {
            let Some(node) = self.get_mut(subscriber) else {
                continue;
            };
            if node.pending == 0 {
                continue;
            }
            node.pending -= 1;
            if node.pending == 0 {
                released.push(subscriber);
            }
        }
        released
    }

    /// Settle a node released by [`Graph::forget_path`].
    pub(crate) fn take_ready(&mut self, id: NodeId, epoch: u64) -> Result<Step, ReactiveError> {
        let Some(node) = self.get_mut(id) else {
            return Ok(Step::Waiting);
        };
        if node.pending > 0 {
            return Ok(Step::Waiting);
        }
        release(node, id, epoch)
    }

    /// Tell the subscribers still waiting in this wave that `id` changed.
    pub(crate) fn flag_subscribers(&mut self, id: NodeId) {
        for subscriber in self.subscribers(id) {
            if let Some(node) = self.get_mut(subscriber) {
                if node.pending > 0 {
                    node.requires_update = true;
                }
            }
        }
    }

    /// Clear leftover wave state on every touched node.
    pub(crate) fn settle(&mut self, touched: &mut Vec<NodeId>) {
        for id in touched.drain(..) {
            if let Some(node) = self.get_mut(id) {
                node.reset_wave();
            }
        }
    }
}

/// A node with no open paths: decide whether it recomputes and hand over the
/// paths it marked.
fn release(node: &mut Node, id: NodeId, epoch: u64) -> Result<Step, ReactiveError> {
    let recompute = node.needs_recompute(epoch);
    if recompute && node.computing {
        return Err(ReactiveError::CycleDetected { node: id });
    }
    node.requires_update = false;
    Ok(Step::Ready {
        recompute,
        subscribers: std::mem::take(&mut node.marked),
    })
}
