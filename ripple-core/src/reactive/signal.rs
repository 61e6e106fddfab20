//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    running computation subscribes to the signal.
//!
//! 2. When a signal's value changes, every node downstream of it is marked,
//!    then swept in dependency order.
//!
//! 3. Writing a value equal to the current one does nothing.

use std::fmt;

use super::effect::Effect;
use super::handle::{Handle, Shared};
use super::runtime::with_runtime;
use crate::error::ReactiveError;
use crate::graph::{NodeId, NodeKind};

/// A writable reactive cell holding a value of type `T`.
///
/// Cloning a signal yields another handle to the same cell. The cell is
/// released when the last handle drops; computeds and effects that read the
/// signal keep their own handle to it.
///
/// # Example
///
/// ```rust
/// use ripple_core::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    handle: Handle<T>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    ///
    /// The signal is activated by its first read.
    pub fn new(value: T) -> Self {
        let id = with_runtime(|rt| rt.create(NodeKind::Signal));
        Self {
            handle: Handle::from_shared(Shared::new(id, Some(value))),
        }
    }

    /// Get the signal's id.
    pub fn id(&self) -> NodeId {
        self.handle.id()
    }

    /// Read the value by reference, registering a dependency.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.handle.with(f)
    }

    /// A type-erased view usable alongside computeds.
    pub fn handle(&self) -> Handle<T> {
        self.handle.clone()
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a reactive context, the running computation also
    /// subscribes to this signal.
    pub fn get(&self) -> T {
        self.handle.get()
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> T {
        self.handle.peek()
    }

    /// Run `f` with the current value now and after every change.
    ///
    /// Returns the underlying effect; dispose it to stop the callbacks.
    pub fn subscribe<F>(&self, f: F) -> Effect
    where
        F: Fn(T) + 'static,
    {
        let signal = self.clone();
        Effect::new(move || f(signal.get()))
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and propagate it.
    ///
    /// Unless a batch is open, every computed and effect downstream of this
    /// signal is up to date when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`ReactiveError::CycleDetected`] if propagating the write made a
    /// node re-enter its own computation. The value is stored either way.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        self.handle.set(value)
    }

    /// Update the value using a function of the current value.
    ///
    /// The current value is read without tracking.
    pub fn update<F>(&self, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.handle.with_cached(f);
        self.set(next)
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T: 'static> From<Signal<T>> for Handle<T> {
    fn from(signal: Signal<T>) -> Self {
        signal.handle
    }
}

impl<T: fmt::Display + 'static> fmt::Display for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.handle, f)
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.handle.shared.value.borrow())
            .finish()
    }
}

/// Create a signal. Shorthand for [`Signal::new`].
pub fn signal<T: 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
