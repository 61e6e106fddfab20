//! Graph Nodes
//!
//! This module defines the node record stored in the arena for every signal,
//! computed and effect. Values are not stored here: they live in the typed
//! handle, and the node only carries the bookkeeping that propagation needs.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::error::ReactiveError;

/// Stable identifier for a node in the dependency graph.
///
/// The index addresses an arena slot; the generation distinguishes the node
/// from earlier occupants of the same slot, so an id held past its node's
/// release never resolves to a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this id was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A writable leaf.
    Signal,

    /// A lazily derived, memoized value.
    Computed,

    /// An eager observer. Effects have dependencies but never subscribers.
    Effect,
}

/// Recomputation routine stored with a node.
///
/// Returns `Ok(true)` when the node's cached value changed.
pub(crate) type Updater = Rc<dyn Fn() -> Result<bool, ReactiveError>>;

/// A vertex of the dependency graph.
pub(crate) struct Node {
    kind: NodeKind,

    /// Set once the node has been read or activated.
    pub(crate) active: bool,

    /// Set by effect disposal; a disposed node is never reactivated.
    pub(crate) disposed: bool,

    /// Nodes that read this node during their last recomputation.
    pub(crate) subscribers: IndexSet<NodeId>,

    /// Nodes this node read during its last recomputation.
    pub(crate) dependencies: IndexSet<NodeId>,

    /// Marked paths into this node that the current wave has not resolved.
    pub(crate) pending: u32,

    /// Set while the updater is running.
    pub(crate) computing: bool,

    /// Set when a resolved dependency changed during the current wave.
    pub(crate) requires_update: bool,

    /// Subscribers whose `pending` this node raised in the current wave. Each
    /// one is resolved exactly once, when this node settles or the edge goes
    /// away.
    pub(crate) marked: IndexSet<NodeId>,

    /// Write epoch at which the updater last started.
    pub(crate) verified_at: u64,

    pub(crate) updater: Option<Updater>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, updater: Option<Updater>) -> Self {
        Self {
            kind,
            active: false,
            disposed: false,
            subscribers: IndexSet::new(),
            dependencies: IndexSet::new(),
            pending: 0,
            computing: false,
            requires_update: false,
            marked: IndexSet::new(),
            verified_at: 0,
            updater,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Computeds and effects only change through their own updater.
    pub(crate) fn is_readonly(&self) -> bool {
        self.kind != NodeKind::Signal
    }

    /// Whether a read has to run the updater before the cached value is usable.
    ///
    /// A node still waiting in the current wave is stale until it has been
    /// recomputed once under the latest write `epoch`.
    pub(crate) fn is_stale(&self, epoch: u64) -> bool {
        if self.disposed {
            return false;
        }
        let waiting = self.pending > 0 || self.requires_update;
        !self.active || (waiting && self.verified_at != epoch)
    }

    /// Whether a node whose marked paths have all resolved must run its
    /// updater. A pull under the current epoch already consumed every change.
    pub(crate) fn needs_recompute(&self, epoch: u64) -> bool {
        self.requires_update
            && self.active
            && !self.disposed
            && (self.kind == NodeKind::Signal || self.verified_at != epoch)
    }

    /// Clear the per-wave propagation state.
    pub(crate) fn reset_wave(&mut self) {
        self.pending = 0;
        self.requires_update = false;
        self.marked.clear();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("active", &self.active)
            .field("disposed", &self.disposed)
            .field("subscribers", &self.subscribers)
            .field("dependencies", &self.dependencies)
            .field("pending", &self.pending)
            .field("computing", &self.computing)
            .field("requires_update", &self.requires_update)
            .field("marked", &self.marked)
            .finish_non_exhaustive()
    }
}
