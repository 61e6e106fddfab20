//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. Nothing runs at creation. The first read evaluates the function under a
//!    reactive context, which records what it read, and caches the result.
//!
//! 2. From then on the computed is active: a write upstream marks it, and the
//!    sweep re-evaluates it once all of its marked dependencies have settled.
//!
//! 3. If the new result equals the cached one, nodes downstream are not
//!    re-evaluated on its account.
//!
//! 4. When nothing subscribes to it any more it goes inactive and stops
//!    listening upstream. The next read refreshes it on demand.
//!
//! # Failures
//!
//! A computation that panics (or, for [`Computed::try_new`], returns `Err`)
//! keeps the previous value. The failure is logged and handed to the
//! thread's error handler; see [`set_error_handler`](crate::set_error_handler).

use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::context::ReactiveContext;
use super::handle::{panic_message, Handle, Shared};
use super::runtime::with_runtime;
use crate::error::ReactiveError;
use crate::graph::{NodeId, NodeKind, Updater};

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. The `PartialEq` bound is needed to
///   detect when the value actually changed.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5).unwrap();
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: 'static> {
    handle: Handle<T>,
}

impl<T: PartialEq + 'static> Computed<T> {
    /// Create a new computed with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::try_new(move || Ok::<T, Infallible>(compute()))
    }

    /// Create a computed from a fallible computation.
    ///
    /// An `Err` is treated like a panic in [`Computed::new`]: it is reported
    /// and the previous value is kept.
    pub fn try_new<F, E>(compute: F) -> Self
    where
        F: Fn() -> Result<T, E> + 'static,
        E: fmt::Display,
    {
        let id = with_runtime(|rt| rt.create(NodeKind::Computed));
        let shared = Shared::new(id, None);
        let updater = updater(Rc::downgrade(&shared), compute);
        with_runtime(|rt| rt.install(id, updater));

        Self {
            handle: Handle::from_shared(shared),
        }
    }
}

impl<T: 'static> Computed<T> {
    /// Get the computed's id.
    pub fn id(&self) -> NodeId {
        self.handle.id()
    }

    /// Read the value by reference, registering a dependency.
    ///
    /// # Panics
    ///
    /// Panics if every evaluation so far has failed.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.handle.with(f)
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.handle.shared.value.borrow().is_some()
    }

    /// A type-erased view usable alongside signals.
    pub fn handle(&self) -> Handle<T> {
        self.handle.clone()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value, evaluating first if needed.
    ///
    /// # Panics
    ///
    /// Panics if every evaluation so far has failed. Use
    /// [`Computed::try_get`] to handle that case.
    pub fn get(&self) -> T {
        self.handle.get()
    }

    /// Get the current value without tracking dependencies.
    ///
    /// An inactive computed is still refreshed, so this returns an up-to-date
    /// value even when nothing subscribes to it.
    ///
    /// # Panics
    ///
    /// Same as [`Computed::get`].
    pub fn peek(&self) -> T {
        self.handle.peek()
    }

    /// Like [`Computed::get`], but `None` if no evaluation has succeeded yet.
    pub fn try_get(&self) -> Option<T> {
        self.handle.try_get()
    }
}

/// Build the recomputation routine stored in the graph.
///
/// It only holds a weak reference to the value cell, so the graph never keeps
/// a computed alive on its own.
fn updater<T, F, E>(shared: Weak<Shared<T>>, compute: F) -> Updater
where
    T: PartialEq + 'static,
    F: Fn() -> Result<T, E> + 'static,
    E: fmt::Display,
{
    Rc::new(move || {
        let Some(shared) = shared.upgrade() else {
            return Ok(false);
        };
        let id = shared.id;

        let outcome = {
            let _ctx = ReactiveContext::enter(id);
            panic::catch_unwind(AssertUnwindSafe(&compute))
        };

        match outcome {
            Ok(Ok(value)) => Ok(shared.store(value)),
            Ok(Err(err)) => Err(ReactiveError::Compute {
                node: id,
                message: err.to_string(),
            }),
            Err(payload) => Err(ReactiveError::Compute {
                node: id,
                message: panic_message(payload.as_ref()),
            }),
        }
    })
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T: 'static> From<Computed<T>> for Handle<T> {
    fn from(computed: Computed<T>) -> Self {
        computed.handle
    }
}

impl<T: fmt::Display + 'static> fmt::Display for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.handle, f)
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("value", &self.handle.shared.value.borrow())
            .finish()
    }
}

/// Create a computed. Shorthand for [`Computed::new`].
pub fn computed<T, F>(compute: F) -> Computed<T>
where
    T: PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
