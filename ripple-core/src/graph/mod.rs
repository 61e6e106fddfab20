//! Dependency Graph
//!
//! This module implements the dependency graph shared by signals, computeds
//! and effects.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are signals (sources), computeds (derived values) or effects
//! - Edges point from a node to its subscribers: if B read A during its last
//!   recomputation, there is an edge from A to B
//!
//! When a signal changes, the scheduler marks the reachable subgraph and the
//! runtime sweeps it, recomputing each affected node once in dependency order.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena addressed by generational ids, so edges are plain
//!    index sets and nodes never own each other.
//!
//! 2. Both directions of every edge are stored. Subscribers drive propagation;
//!    dependencies are used to reconcile edges after a recomputation and to
//!    tear a node down.
//!
//! 3. Every traversal uses an explicit worklist, so graph depth is bounded by
//!    heap rather than stack.

mod arena;
mod node;
mod scheduler;

pub use node::{NodeId, NodeKind};

pub(crate) use arena::{Graph, Snapshot};
pub(crate) use node::{Node, Updater};
pub(crate) use scheduler::Step;
