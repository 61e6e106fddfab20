//! Reactive Primitives
//!
//! This module implements the reactive system: signals, computeds and effects,
//! plus the runtime that keeps them consistent.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (a computed or effect), the signal registers that
//! context as a subscriber. When the value changes, every node downstream is
//! brought up to date before the write returns.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changes, and at most once per write even when
//! several of its dependencies change together.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are how reactive state reaches the outside
//! world.
//!
//! # Implementation Notes
//!
//! Each thread owns a runtime holding the dependency graph (see
//! [`crate::graph`]) and a stack of evaluation contexts. Reading a node inside
//! a computation records an edge; the edges a computation did not use on its
//! latest run are removed when it finishes. Handles are `Rc`-based and
//! therefore cannot leave the thread whose graph they belong to.

mod batch;
mod computed;
mod context;
mod effect;
mod handle;
mod runtime;
mod signal;

pub use batch::{batch, is_batching, is_tracking, untracked};
pub use computed::{computed, Computed};
pub use effect::{effect, Effect};
pub use handle::Handle;
pub use runtime::{node_count, set_error_handler, take_error_handler};
pub use signal::{signal, Signal};
