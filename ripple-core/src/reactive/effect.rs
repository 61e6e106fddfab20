//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the sweep re-runs the effect in dependency
//!    order, after every computed it reads has settled.
//!
//! 3. Each run tracks dependencies afresh. A branch the function stopped
//!    reading is unsubscribed when the run ends.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager.
//! - Nothing can subscribe to an effect.
//!
//! # Writes
//!
//! The function runs inside a [`batch`]. Signals it writes are propagated
//! once, when the run finishes. A write that reaches the running effect
//! itself is a cycle.
//!
//! # Lifetime
//!
//! The graph keeps an effect alive after its handles are dropped. It stops
//! only when [`Effect::dispose`] is called.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::batch::batch;
use super::context::ReactiveContext;
use super::handle::panic_message;
use super::runtime::{try_with_runtime, with_runtime};
use crate::error::ReactiveError;
use crate::graph::{NodeId, NodeKind, Updater};

/// State shared between the effect's handles and its updater.
struct EffectState {
    id: NodeId,

    /// Number of times the effect has run.
    runs: Cell<usize>,
}

impl Drop for EffectState {
    fn drop(&mut self) {
        try_with_runtime(|rt| rt.release(self.id));
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use ripple_core::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let effect = Effect::new({
///     let count = count.clone();
///     let log = log.clone();
///     move || log.borrow_mut().push(count.get())
/// });
///
/// count.set(5).unwrap();
/// effect.dispose();
/// count.set(6).unwrap();
///
/// assert_eq!(*log.borrow(), vec![0, 5]);
/// ```
pub struct Effect {
    state: Rc<EffectState>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish dependencies. A panic in
    /// that first run is reported like any later one; the effect stays
    /// subscribed to whatever it read before panicking.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let id = with_runtime(|rt| rt.create(NodeKind::Effect));
        let state = Rc::new(EffectState {
            id,
            runs: Cell::new(0),
        });

        let updater = updater(Rc::clone(&state), run);
        with_runtime(|rt| {
            rt.install(id, updater);
            rt.refresh(id);
        });

        Self { state }
    }

    /// Get the effect's id.
    pub fn id(&self) -> NodeId {
        self.state.id
    }

    /// Dispose of the effect.
    ///
    /// Unsubscribes from every dependency and drops the function. After
    /// disposal the effect never runs again. Disposing twice is a no-op.
    pub fn dispose(&self) {
        with_runtime(|rt| rt.dispose(self.state.id));
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        with_runtime(|rt| rt.is_disposed(self.state.id))
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.state.runs.get()
    }
}

fn updater<F>(state: Rc<EffectState>, run: F) -> Updater
where
    F: Fn() + 'static,
{
    Rc::new(move || {
        let id = state.id;
        let outcome = {
            let _ctx = ReactiveContext::enter(id);
            panic::catch_unwind(AssertUnwindSafe(|| batch(&run)))
        };
        state.runs.set(state.runs.get() + 1);

        match outcome {
            Ok(result) => result.map(|()| false),
            Err(payload) => {
                // The unwound batch left its writes queued.
                with_runtime(|rt| rt.flush_if_idle())?;
                Err(ReactiveError::Compute {
                    node: id,
                    message: panic_message(payload.as_ref()),
                })
            }
        }
    })
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect. Shorthand for [`Effect::new`].
pub fn effect<F>(run: F) -> Effect
where
    F: Fn() + 'static,
{
    Effect::new(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
