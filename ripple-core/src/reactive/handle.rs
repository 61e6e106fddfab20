//! Typed handles over graph nodes.
//!
//! The arena only stores bookkeeping. A node's value lives in a [`Shared`]
//! cell owned by its handles; dropping the last handle releases the node.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::{try_with_runtime, with_runtime};
use crate::error::ReactiveError;
use crate::graph::NodeId;

/// Value cell shared by every handle to one node.
pub(crate) struct Shared<T> {
    pub(crate) id: NodeId,
    pub(crate) value: RefCell<Option<T>>,
}

impl<T> Shared<T> {
    pub(crate) fn new(id: NodeId, value: Option<T>) -> Rc<Self> {
        Rc::new(Self {
            id,
            value: RefCell::new(value),
        })
    }

    /// Store `value` unless it equals the cached one. Returns whether it changed.
    pub(crate) fn store(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let previous = {
            let mut slot = self.value.borrow_mut();
            if slot.as_ref() == Some(&value) {
                return false;
            }
            slot.replace(value)
        };
        // Old values may own handles; drop them with the cell unborrowed.
        drop(previous);
        true
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        try_with_runtime(|rt| rt.release(self.id));
    }
}

/// A reactive value of either kind.
///
/// `Handle<T>` is what [`Signal<T>`](crate::Signal) and
/// [`Computed<T>`](crate::Computed) share. It lets code hold signals and
/// computeds side by side; writes through it are checked at runtime and fail
/// with [`ReactiveError::ReadonlyWrite`] on a computed.
pub struct Handle<T: 'static> {
    pub(crate) shared: Rc<Shared<T>>,
}

impl<T: 'static> Handle<T> {
    pub(crate) fn from_shared(shared: Rc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// The node's id in this thread's graph.
    pub fn id(&self) -> NodeId {
        self.shared.id
    }

    /// Whether writes to this node are rejected.
    pub fn is_readonly(&self) -> bool {
        with_runtime(|rt| rt.is_readonly(self.id()))
    }

    /// Refresh if needed and record the read in the current context.
    pub(crate) fn track(&self) {
        let id = self.id();
        with_runtime(|rt| rt.refresh(id));
        ReactiveContext::track_dependency(id);
    }

    /// Refresh if needed without recording the read.
    pub(crate) fn touch(&self) {
        let id = self.id();
        with_runtime(|rt| rt.refresh(id));
    }

    /// Read the value by reference, registering a dependency.
    ///
    /// # Panics
    ///
    /// Panics if the node is a computed whose every evaluation so far has
    /// failed, or if `f` writes to this same node.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        self.with_cached(f)
    }

    pub(crate) fn with_cached<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.shared.value.borrow();
        match value.as_ref() {
            Some(value) => f(value),
            None => panic!(
                "node {} has no value: its computation never succeeded (use `try_get` to handle this)",
                self.id()
            ),
        }
    }
}

impl<T: Clone + 'static> Handle<T> {
    /// Get the current value.
    ///
    /// Activates the node on first access. Inside a computed or effect, the
    /// running computation subscribes to this node.
    ///
    /// # Panics
    ///
    /// Panics if the node is a computed whose every evaluation so far has
    /// failed.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without registering a dependency.
    ///
    /// # Panics
    ///
    /// Same as [`Handle::get`].
    pub fn peek(&self) -> T {
        self.touch();
        self.with_cached(T::clone)
    }

    /// Get the current value, or `None` for a computed that has never
    /// produced one. Registers a dependency like [`Handle::get`].
    pub fn try_get(&self) -> Option<T> {
        self.track();
        self.shared.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Handle<T> {
    /// Write a new value.
    ///
    /// Equal values are ignored. Otherwise every node that depends on this one
    /// is brought up to date before this returns, unless a [`batch`](crate::batch)
    /// is open.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        let id = self.id();
        with_runtime(|rt| rt.check_writable(id))?;
        if !self.shared.store(value) {
            return Ok(());
        }
        with_runtime(|rt| rt.write(id))
    }
}

impl<T: 'static> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Display + 'static> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.touch();
        match self.shared.value.borrow().as_ref() {
            Some(value) => fmt::Display::fmt(value, f),
            None => Ok(()),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id())
            .field("value", &self.shared.value.borrow())
            .finish()
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
