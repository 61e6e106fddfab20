//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds and
//! effects. It owns the dependency graph, the evaluation-context stack, the
//! set of written signals waiting to be swept, and the error sink.
//!
//! # How It Works
//!
//! 1. A signal write stores the value in the signal's handle, then asks the
//!    runtime to enqueue and mark the signal.
//!
//! 2. If no batch is open, the runtime sweeps: it walks outward from the
//!    written signals and recomputes each affected node once, after all of
//!    its marked dependencies have settled.
//!
//! 3. Recomputations run user code. The graph is never borrowed while user
//!    code runs, so a computation can read other nodes, write signals (which
//!    starts a nested wave) or create and drop handles.
//!
//! # Thread Confinement
//!
//! Each thread has its own runtime in thread-local storage, and handles are
//! built on `Rc`, so the graph can only be touched from the thread that
//! created it. Mark and sweep never interleave with another thread's writes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexSet;

use super::context::Frame;
use crate::error::ReactiveError;
use crate::graph::{Graph, Node, NodeId, NodeKind, Snapshot, Step, Updater};

pub(crate) type ErrorHandler = Rc<dyn Fn(&ReactiveError)>;

/// Per-thread reactive state.
pub(crate) struct Runtime {
    pub(crate) graph: RefCell<Graph>,

    /// Evaluation contexts, innermost last.
    pub(crate) frames: RefCell<Vec<Frame>>,

    /// Nodes whose last open path was dropped outside the sweep walk.
    pub(crate) ready: RefCell<Vec<NodeId>>,

    /// Written signals waiting for the next sweep, in write order.
    pending: RefCell<IndexSet<NodeId>>,

    /// Every node marked since the outermost wave started.
    touched: RefCell<Vec<NodeId>>,

    /// Bumped by every signal write. A node recomputed under the current
    /// epoch has already seen every stored value.
    epoch: Cell<u64>,

    batch_depth: Cell<u32>,
    flush_depth: Cell<u32>,

    /// First structural error raised inside the current outermost wave.
    abort: RefCell<Option<ReactiveError>>,

    error_handler: RefCell<Option<ErrorHandler>>,
}

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Run `f` against this thread's runtime.
pub(crate) fn with_runtime<F, R>(f: F) -> R
where
    F: FnOnce(&Runtime) -> R,
{
    RUNTIME.with(f)
}

/// Like [`with_runtime`], but safe to call from `Drop` during thread teardown.
pub(crate) fn try_with_runtime<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&Runtime) -> R,
{
    RUNTIME.try_with(f).ok()
}

/// Install a handler for contained errors on this thread.
///
/// The handler sees every [`ReactiveError::Compute`] after it is logged, and
/// any cycle that no caller could receive (one found while an effect was
/// being created, for example). It replaces the previous handler.
///
/// The handler must not write to signals.
pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&ReactiveError) + 'static,
{
    with_runtime(|rt| rt.replace_error_handler(Some(Rc::new(handler))));
}

/// Remove this thread's error handler and return it.
pub fn take_error_handler() -> Option<Rc<dyn Fn(&ReactiveError)>> {
    with_runtime(|rt| rt.replace_error_handler(None))
}

/// Number of live nodes in this thread's graph.
pub fn node_count() -> usize {
    with_runtime(|rt| rt.node_count())
}

impl Runtime {
    fn new() -> Self {
        Self {
            graph: RefCell::new(Graph::new()),
            frames: RefCell::new(Vec::new()),
            ready: RefCell::new(Vec::new()),
            pending: RefCell::new(IndexSet::new()),
            touched: RefCell::new(Vec::new()),
            epoch: Cell::new(0),
            batch_depth: Cell::new(0),
            flush_depth: Cell::new(0),
            abort: RefCell::new(None),
            error_handler: RefCell::new(None),
        }
    }

    // ------------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------------

    pub(crate) fn create(&self, kind: NodeKind) -> NodeId {
        let id = self.graph.borrow_mut().insert(Node::new(kind, None));
        tracing::trace!(node = %id, ?kind, "created");
        id
    }

    pub(crate) fn install(&self, id: NodeId, updater: Updater) {
        if let Some(node) = self.graph.borrow_mut().get_mut(id) {
            node.updater = Some(updater);
        }
    }

    /// Free a node whose last handle was dropped.
    pub(crate) fn release(&self, id: NodeId) {
        let Ok(mut graph) = self.graph.try_borrow_mut() else {
            tracing::warn!(node = %id, "node dropped while the graph is borrowed; slot leaked");
            return;
        };
        let released = graph.forget_marks(id);
        let removed = graph.remove(id);
        drop(graph);

        if let Ok(mut pending) = self.pending.try_borrow_mut() {
            pending.shift_remove(&id);
        }
        if let Ok(mut ready) = self.ready.try_borrow_mut() {
            ready.extend(released);
        }
        tracing::trace!(node = %id, "released");

        // The updater may own other handles; drop it with no borrow held.
        drop(removed);
    }

    /// Permanently tear down an effect.
    pub(crate) fn dispose(&self, id: NodeId) {
        let updater = {
            let mut graph = self.graph.borrow_mut();
            let Some(node) = graph.get_mut(id) else {
                return;
            };
            if node.disposed {
                return;
            }
            node.disposed = true;
            node.active = false;
            node.reset_wave();
            let updater = node.updater.take();
            let dependencies: Snapshot = node.dependencies.iter().copied().collect();
            for dependency in dependencies {
                graph.unsubscribe(id, dependency);
            }
            updater
        };
        tracing::trace!(node = %id, "disposed");
        drop(updater);
    }

    pub(crate) fn is_disposed(&self, id: NodeId) -> bool {
        self.graph
            .borrow()
            .get(id)
            .map_or(true, |node| node.disposed)
    }

    pub(crate) fn is_readonly(&self, id: NodeId) -> bool {
        self.graph
            .borrow()
            .get(id)
            .is_some_and(|node| node.is_readonly())
    }

    pub(crate) fn node_count(&self) -> usize {
        self.graph.borrow().len()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Bring a node up to date before its value is read.
    ///
    /// Inactive nodes and nodes still pending in the current wave run their
    /// updater synchronously, at most once per write epoch; the sweep then
    /// skips them unless another write reaches them. Reading a node that is
    /// computing is a cycle.
    pub(crate) fn refresh(&self, id: NodeId) {
        let epoch = self.epoch.get();
        let state = self
            .graph
            .borrow()
            .get(id)
            .map(|node| (node.kind(), node.is_stale(epoch), node.computing));
        let Some((kind, stale, computing)) = state else {
            return;
        };

        if computing {
            let err = ReactiveError::CycleDetected { node: id };
            if self.flush_depth.get() > 0 {
                self.fail(err);
            } else {
                self.report(&err);
            }
            return;
        }
        if !stale {
            return;
        }

        if kind == NodeKind::Signal {
            if let Some(node) = self.graph.borrow_mut().get_mut(id) {
                node.active = true;
            }
            return;
        }

        match self.recompute(id) {
            Ok(true) => self.graph.borrow_mut().flag_subscribers(id),
            Ok(false) => {}
            // Inside a wave the error already reached the abort slot.
            Err(err) if self.flush_depth.get() == 0 => self.report(&err),
            Err(_) => {}
        }
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    pub(crate) fn check_writable(&self, id: NodeId) -> Result<(), ReactiveError> {
        if self.is_readonly(id) {
            return Err(ReactiveError::ReadonlyWrite { node: id });
        }
        Ok(())
    }

    /// Propagate a write whose value has already been stored.
    pub(crate) fn write(&self, id: NodeId) -> Result<(), ReactiveError> {
        self.epoch.set(self.epoch.get() + 1);
        if self.pending.borrow_mut().insert(id) {
            self.graph
                .borrow_mut()
                .mark(id, &mut self.touched.borrow_mut());
        }

        if self.batch_depth.get() > 0 {
            return Ok(());
        }
        self.flush()
    }

    pub(crate) fn begin_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    /// Close a batch, sweeping if it was the outermost one.
    pub(crate) fn end_batch(&self) -> Result<(), ReactiveError> {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if depth > 0 || self.pending.borrow().is_empty() {
            return Ok(());
        }
        self.flush()
    }

    /// Close a batch that is unwinding. Queued writes stay marked and are
    /// swept by the next wave.
    pub(crate) fn abandon_batch(&self) {
        self.batch_depth
            .set(self.batch_depth.get().saturating_sub(1));
    }

    pub(crate) fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    /// Sweep queued writes unless a batch is still collecting them.
    pub(crate) fn flush_if_idle(&self) -> Result<(), ReactiveError> {
        if self.is_batching() || self.pending.borrow().is_empty() {
            return Ok(());
        }
        self.flush()
    }

    fn flush(&self) -> Result<(), ReactiveError> {
        let depth = self.flush_depth.get();
        self.flush_depth.set(depth + 1);
        let result = self.drain();
        self.flush_depth.set(depth);

        if depth == 0 {
            let touched = {
                let mut touched = self.touched.borrow_mut();
                let count = touched.len();
                self.graph.borrow_mut().settle(&mut touched);
                count
            };
            self.ready.borrow_mut().clear();
            if result.is_err() {
                self.pending.borrow_mut().clear();
            }
            self.abort.borrow_mut().take();
            tracing::debug!(touched, ok = result.is_ok(), "wave settled");
        }
        result
    }

    fn drain(&self) -> Result<(), ReactiveError> {
        loop {
            let roots = std::mem::take(&mut *self.pending.borrow_mut());
            if roots.is_empty() {
                return Ok(());
            }
            tracing::debug!(roots = roots.len(), "sweeping");
            self.sweep(roots)?;
        }
    }

    /// Sweep phase.
    ///
    /// Depth-first and left to right: after a node settles its subscribers
    /// are visited before the node's next sibling, matching the order in
    /// which mark reached them.
    fn sweep(&self, roots: IndexSet<NodeId>) -> Result<(), ReactiveError> {
        let mut stack = vec![roots.into_iter()];

        loop {
            let ready: Snapshot = self.ready.borrow_mut().drain(..).collect();
            for id in ready {
                let step = self
                    .graph
                    .borrow_mut()
                    .take_ready(id, self.epoch.get())
                    .map_err(|err| self.fail(err))?;
                if let Some(subscribers) = self.settle_node(id, step)? {
                    stack.push(subscribers.into_iter());
                }
            }

            let Some(frame) = stack.last_mut() else {
                return Ok(());
            };
            let Some(id) = frame.next() else {
                stack.pop();
                continue;
            };

            // Nested writes bump the epoch, so it is read per step.
            let step = self
                .graph
                .borrow_mut()
                .resolve(id, self.epoch.get())
                .map_err(|err| self.fail(err))?;
            if let Some(subscribers) = self.settle_node(id, step)? {
                stack.push(subscribers.into_iter());
            }
        }
    }

    /// Recompute a node whose paths all resolved, and return the subscribers
    /// it marked, which the walk continues into.
    fn settle_node(
        &self,
        id: NodeId,
        step: Step,
    ) -> Result<Option<IndexSet<NodeId>>, ReactiveError> {
        let Step::Ready {
            recompute,
            subscribers,
        } = step
        else {
            return Ok(None);
        };
        if recompute && self.recompute(id)? {
            self.graph.borrow_mut().flag_subscribers(id);
        }
        Ok(Some(subscribers).filter(|subscribers| !subscribers.is_empty()))
    }

    /// Run a node's updater.
    ///
    /// Returns whether the cached value changed. Compute errors are reported
    /// and count as "unchanged"; structural errors abort the wave.
    fn recompute(&self, id: NodeId) -> Result<bool, ReactiveError> {
        let updater = {
            let mut graph = self.graph.borrow_mut();
            let Some(node) = graph.get_mut(id) else {
                return Ok(false);
            };
            if node.computing {
                drop(graph);
                return Err(self.fail(ReactiveError::CycleDetected { node: id }));
            }
            node.active = true;
            node.requires_update = false;
            node.verified_at = self.epoch.get();
            // Signals have nothing to run; the written value is already stored.
            let Some(updater) = node.updater.clone() else {
                return Ok(true);
            };
            node.computing = true;
            updater
        };

        tracing::trace!(node = %id, "recomputing");
        let outcome = updater();

        if let Some(node) = self.graph.borrow_mut().get_mut(id) {
            node.computing = false;
        }
        if let Some(err) = self.abort.borrow().clone() {
            return Err(err);
        }

        match outcome {
            Ok(changed) => Ok(changed),
            Err(err) if err.is_structural() => Err(self.fail(err)),
            Err(err) => {
                self.report(&err);
                Ok(false)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------

    /// Record a structural error so every enclosing wave aborts too.
    fn fail(&self, err: ReactiveError) -> ReactiveError {
        if self.flush_depth.get() > 0 {
            let mut abort = self.abort.borrow_mut();
            if abort.is_none() {
                tracing::error!(error = %err, "propagation aborted");
                *abort = Some(err.clone());
            }
        }
        err
    }

    /// Hand a contained error to the sink.
    pub(crate) fn report(&self, err: &ReactiveError) {
        tracing::error!(node = %err.node(), error = %err, "reactive error");
        let handler = self.error_handler.borrow().clone();
        if let Some(handler) = handler {
            handler(err);
        }
    }

    pub(crate) fn replace_error_handler(&self, handler: Option<ErrorHandler>) -> Option<ErrorHandler> {
        std::mem::replace(&mut *self.error_handler.borrow_mut(), handler)
    }
}
