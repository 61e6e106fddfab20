//! Ripple Core
//!
//! This crate provides an incremental recomputation runtime. It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - A dependency graph that rewires itself as computations take different
//!   branches
//! - Two-phase mark and sweep propagation that recomputes each affected node
//!   at most once per write, in dependency order
//!
//! # Architecture
//!
//! - `graph`: node arena, edge maintenance and the mark/resolve bookkeeping
//! - `reactive`: the per-thread runtime and the typed handles built on it
//! - `error`: [`ReactiveError`]
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ripple_core::{Computed, Effect, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = Computed::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let _effect = Effect::new({
//!     let (count, doubled, log) = (count.clone(), doubled.clone(), log.clone());
//!     move || log.borrow_mut().push((count.get(), doubled.get()))
//! });
//!
//! // Update the signal; the effect has already run when `set` returns
//! count.set(5).unwrap();
//! assert_eq!(*log.borrow(), vec![(0, 0), (5, 10)]);
//! ```
//!
//! # Threads
//!
//! The graph is per thread. Handles are `!Send`, so a value created on one
//! thread can only be read and written there.

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::ReactiveError;
pub use graph::{NodeId, NodeKind};
pub use reactive::{
    batch, computed, effect, is_batching, is_tracking, node_count, set_error_handler, signal,
    take_error_handler, untracked, Computed, Effect, Handle, Signal,
};
