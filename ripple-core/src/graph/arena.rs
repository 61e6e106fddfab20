//! Node Arena
//!
//! All nodes live in one flat table and refer to each other by [`NodeId`].
//! Edges are index sets on both endpoints, so there are no ownership cycles
//! between nodes and edge mutation stays O(1) amortized.
//!
//! The arena is also the only place that mutates edges. Keeping both sides
//! of every edge in one function preserves the symmetry invariant:
//! `b ∈ a.subscribers ⇔ a ∈ b.dependencies`.

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::node::{Node, NodeId};

/// Subscriber lists are copied before being walked; most nodes have few.
pub(crate) type Snapshot = SmallVec<[NodeId; 4]>;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// The dependency graph.
#[derive(Default)]
pub(crate) struct Graph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Graph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store a node and return its id.
    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId::from_raw_parts(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::from_raw_parts(index, 0)
    }

    /// Take a node out of the arena.
    ///
    /// Edges pointing at the node from other nodes are removed; the node's own
    /// dependencies are unsubscribed, cascading deactivation upstream. The
    /// returned node still owns its updater so the caller can drop it outside
    /// any borrow of the runtime.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() || slot.node.is_none() {
            return None;
        }

        let mut node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;

        for subscriber in node.subscribers.drain(..) {
            if let Some(sub) = self.get_mut(subscriber) {
                sub.dependencies.shift_remove(&id);
            }
        }

        let dependencies: Vec<NodeId> = node.dependencies.drain(..).collect();
        for dependency in dependencies {
            self.unsubscribe(id, dependency);
        }

        Some(node)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    /// Number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Record that `reader` read `target`.
    ///
    /// Reading a node activates it.
    pub(crate) fn link(&mut self, reader: NodeId, target: NodeId) {
        if reader == target || !self.get(reader).is_some_and(|node| !node.disposed) {
            return;
        }
        let Some(node) = self.get_mut(target) else {
            return;
        };
        node.active = true;
        node.subscribers.insert(reader);

        if let Some(node) = self.get_mut(reader) {
            node.dependencies.insert(target);
        }
    }

    /// Remove the edge `target → reader`.
    ///
    /// When `target` loses its last subscriber it is deactivated and
    /// unsubscribed from its own dependencies, and so on up the chain.
    pub(crate) fn unsubscribe(&mut self, reader: NodeId, target: NodeId) {
        let mut work = vec![(reader, target)];

        while let Some((reader, target)) = work.pop() {
            if let Some(node) = self.get_mut(reader) {
                node.dependencies.shift_remove(&target);
            }

            let Some(node) = self.get_mut(target) else {
                continue;
            };
            node.marked.shift_remove(&reader);
            if !node.subscribers.shift_remove(&reader) || !node.subscribers.is_empty() {
                continue;
            }

            node.active = false;
            node.reset_wave();
            for dependency in node.dependencies.iter().rev() {
                work.push((target, *dependency));
            }
            tracing::trace!(node = %target, "deactivated");
        }
    }

    /// Swap in an empty dependency set and return the previous one.
    pub(crate) fn take_dependencies(&mut self, id: NodeId) -> IndexSet<NodeId> {
        self.get_mut(id)
            .map(|node| std::mem::take(&mut node.dependencies))
            .unwrap_or_default()
    }

    /// Copy of a node's subscribers in first-read order.
    pub(crate) fn subscribers(&self, id: NodeId) -> Snapshot {
        self.get(id)
            .map(|node| node.subscribers.iter().copied().collect())
            .unwrap_or_default()
    }
}
