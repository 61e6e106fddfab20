//! Batching and untracked reads.
//!
//! Both are scopes around a closure: [`batch`] defers propagation to the end
//! of the outermost batch, [`untracked`] hides reads from the running
//! computation.

use super::context::ReactiveContext;
use super::runtime::{try_with_runtime, with_runtime};
use crate::error::ReactiveError;

/// Run `f` with propagation deferred until the outermost batch returns.
///
/// Every node affected by the writes inside is recomputed at most once, in
/// the same order a single write would use. Nested batches just run `f`.
///
/// # Errors
///
/// Returns [`ReactiveError::CycleDetected`] if the sweep at the end of the
/// outermost batch found a cycle. The writes themselves are kept.
///
/// # Example
///
/// ```rust
/// use ripple_core::{batch, Computed, Signal};
///
/// let first = Signal::new("Ada");
/// let last = Signal::new("Lovelace");
/// let full = Computed::new({
///     let (first, last) = (first.clone(), last.clone());
///     move || format!("{} {}", first.get(), last.get())
/// });
/// assert_eq!(full.get(), "Ada Lovelace");
///
/// batch(|| {
///     first.set("Grace").unwrap();
///     last.set("Hopper").unwrap();
/// })
/// .unwrap();
/// assert_eq!(full.get(), "Grace Hopper");
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> Result<R, ReactiveError> {
    let guard = BatchGuard::begin();
    let value = f();
    guard.finish()?;
    Ok(value)
}

/// Run `f` without registering any reads with the running computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

/// Whether reads are currently recorded as dependencies.
pub fn is_tracking() -> bool {
    ReactiveContext::is_active()
}

/// Whether a batch is open on this thread.
pub fn is_batching() -> bool {
    with_runtime(|rt| rt.is_batching())
}

/// Keeps the batch depth balanced when `f` unwinds.
struct BatchGuard {
    open: bool,
}

impl BatchGuard {
    fn begin() -> Self {
        with_runtime(|rt| rt.begin_batch());
        Self { open: true }
    }

    fn finish(mut self) -> Result<(), ReactiveError> {
        self.open = false;
        with_runtime(|rt| rt.end_batch())
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.open {
            try_with_runtime(|rt| rt.abandon_batch());
        }
    }
}
