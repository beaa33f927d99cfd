//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns one session's dependency graph and schedules updates when
//! signals change.
//!
//! # How It Works
//!
//! 1. When a signal, memo or effect is created, it is added to the graph and
//!    attached to the current owner scope.
//!
//! 2. When a memo or effect reads a cell, the runtime records the dependency
//!    in the innermost tracking frame. After the computation finishes, the
//!    recorded set replaces the node's previous dependencies.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks direct dependents dirty and everything further downstream
//!       maybe-dirty
//!    b. Queues affected effects in topological order
//!    c. Runs each queued effect, pulling its memo inputs first so that only
//!       effects whose inputs really changed re-execute
//!    d. Memos are lazy: they recompute on next access
//!
//! Writes inside [`Runtime::batch`] only record the changed signal.
//! Propagation happens once, when the outermost batch ends.
//!
//! # Locking
//!
//! All graph state lives behind one mutex. The lock is never held while user
//! code runs: computations, effects and cleanups are cloned out of the graph
//! first and invoked after the guard is released, so they are free to read
//! and write other cells.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::context::{OwnerGuard, ReactiveContext, TrackingStack};
use super::scope::{Disposer, Scope, ScopeId};
use crate::config::ReactiveConfig;
use crate::error::ReactiveError;
use crate::graph::{Arena, DirtyState, Node, NodeId, NodeKind, UpdateScheduler};

pub(crate) type Value = Box<dyn Any + Send>;
pub(crate) type EqualsFn = Arc<dyn Fn(&dyn Any, &dyn Any) -> bool + Send + Sync>;
pub(crate) type ComputeFn = Arc<dyn Fn() -> Result<Value, ReactiveError> + Send + Sync>;
pub(crate) type RunFn = Arc<dyn Fn() -> Result<(), ReactiveError> + Send + Sync>;

/// Equality over type-erased values using `T: PartialEq`.
pub(crate) fn equality<T: PartialEq + 'static>() -> EqualsFn {
    equality_with(|a: &T, b: &T| a == b)
}

/// Equality over type-erased values using a caller-supplied comparison.
pub(crate) fn equality_with<T, F>(eq: F) -> EqualsFn
where
    T: 'static,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    Arc::new(move |a: &dyn Any, b: &dyn Any| match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => eq(a, b),
        _ => false,
    })
}

/// What the graph stores for each node besides its topology.
pub(crate) enum Payload {
    Signal {
        value: Value,
        equals: EqualsFn,
    },
    Memo {
        value: Option<Value>,
        compute: ComputeFn,
        equals: EqualsFn,
    },
    Effect {
        run: RunFn,
        /// Scope owning everything created by the latest run.
        scope: Option<ScopeId>,
        runs: u64,
    },
    Observer,
}

/// Unique identifier of a runtime, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeId(u64);

static RUNTIME_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl RuntimeId {
    fn next() -> Self {
        Self(RUNTIME_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime#{}", self.0)
    }
}

pub(crate) struct RuntimeState {
    pub(crate) graph: UpdateScheduler<Payload>,
    pub(crate) scopes: Arena<Scope>,
    pub(crate) tracking: TrackingStack,
    pub(crate) owners: Vec<ScopeId>,
    root: ScopeId,
    batch_depth: usize,
    flushing: bool,
    /// Signals written since the last propagation.
    pending: IndexSet<NodeId>,
    /// Effects waiting to run, in scheduling order.
    queue: IndexSet<NodeId>,
    disposed: bool,
}

impl RuntimeState {
    fn current_owner(&self) -> ScopeId {
        self.owners.last().copied().unwrap_or(self.root)
    }

    fn attach(&mut self, disposer: Disposer) {
        let owner = self.current_owner();
        match self.scopes.get_mut(owner.index()) {
            Some(scope) => scope.push(disposer),
            None => warn!(scope = %owner, ?disposer, "owner scope is gone; resource is unowned"),
        }
    }

    /// Turn pending signal writes into dirty flags and queued effects.
    fn propagate(&mut self) {
        let pending: Vec<NodeId> = self.pending.drain(..).collect();
        for source in pending {
            let affected = self.graph.mark_changed(source);
            trace!(%source, affected = affected.len(), "propagating change");

            for id in affected {
                let is_effect = self
                    .graph
                    .get_node(id)
                    .is_some_and(|node| node.kind() == NodeKind::Effect);
                if is_effect {
                    self.queue.insert(id);
                }
            }
        }
    }
}

struct RuntimeInner {
    id: RuntimeId,
    config: ReactiveConfig,
    state: Mutex<RuntimeState>,
}

/// One session's reactive graph.
///
/// `Runtime` is a cheap handle; clones share the same graph. Every signal,
/// memo and effect belongs to exactly one runtime and is addressed through
/// it, so independent sessions never observe each other's cells.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with default settings.
    pub fn new() -> Self {
        Self::with_config(ReactiveConfig::default())
    }

    /// Create a runtime with the given settings.
    pub fn with_config(config: ReactiveConfig) -> Self {
        let mut scopes = Arena::new();
        let root = ScopeId::from_index(scopes.insert(Scope::default()));
        let id = RuntimeId::next();
        debug!(runtime = %id, "runtime created");

        Self {
            inner: Arc::new(RuntimeInner {
                id,
                config,
                state: Mutex::new(RuntimeState {
                    graph: UpdateScheduler::new(),
                    scopes,
                    tracking: TrackingStack::default(),
                    owners: Vec::new(),
                    root,
                    batch_depth: 0,
                    flushing: false,
                    pending: IndexSet::new(),
                    queue: IndexSet::new(),
                    disposed: false,
                }),
            }),
        }
    }

    /// Get this runtime's ID.
    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.inner.state.lock()
    }

    /// Number of live nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.state().graph.node_count()
    }

    /// Number of live scopes, including the root scope.
    pub fn scope_count(&self) -> usize {
        self.state().scopes.len()
    }

    /// Number of resources held directly by the root scope.
    pub(crate) fn root_resource_count(&self) -> usize {
        let state = self.state();
        state.scopes.get(state.root.index()).map_or(0, Scope::len)
    }

    /// Whether [`Runtime::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.state().disposed
    }

    /// Whether a batch is currently open.
    pub fn is_batching(&self) -> bool {
        self.state().batch_depth > 0
    }

    /// Whether a computation is currently collecting dependencies.
    pub fn is_tracking(&self) -> bool {
        self.state().tracking.current().is_some()
    }

    /// Get the current dirty state of a node.
    pub fn dirty_state(&self, id: NodeId) -> Result<DirtyState, ReactiveError> {
        self.state()
            .graph
            .get_node(id)
            .map(|node| node.state())
            .ok_or(ReactiveError::Disposed { node: id })
    }

    // ---- Node lifecycle ----

    pub(crate) fn create_node(&self, kind: NodeKind, payload: Payload) -> NodeId {
        let mut state = self.state();
        let id = state.graph.add_node(Node::new(kind), payload);
        state.attach(Disposer::Node(id));
        trace!(runtime = %self.inner.id, node = %id, ?kind, "node created");
        id
    }

    /// Remove a node from the graph and release the scope of its latest run.
    pub(crate) fn dispose_node(&self, id: NodeId) {
        let payload = {
            let mut state = self.state();
            state.queue.shift_remove(&id);
            state.pending.shift_remove(&id);
            state.graph.remove_node(id)
        };

        if let Some(Payload::Effect { scope: Some(scope), .. }) = payload {
            self.dispose_scope(scope);
        }
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.state().graph.contains(id)
    }

    // ---- Scopes ----

    /// Create a scope owned by the current owner.
    pub fn create_scope(&self) -> ScopeId {
        let mut state = self.state();
        let owner = state.current_owner();
        let scope = ScopeId::from_index(state.scopes.insert(Scope::child_of(owner)));
        state.attach(Disposer::Scope(scope));
        scope
    }

    fn create_detached_scope(&self) -> ScopeId {
        ScopeId::from_index(self.state().scopes.insert(Scope::default()))
    }

    /// Run `f` with `scope` as the owner of everything it creates.
    pub fn run_in_scope<R>(&self, scope: ScopeId, f: impl FnOnce() -> R) -> R {
        let _owner = OwnerGuard::enter(self, scope);
        f()
    }

    /// Register an action to run when the current owner scope is disposed.
    ///
    /// Inside an effect, the action runs before the effect's next execution
    /// and when the effect itself is disposed.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + Send + 'static) {
        self.state().attach(Disposer::Cleanup(Box::new(cleanup)));
    }

    /// Dispose a scope: release its resources in reverse acquisition order.
    ///
    /// Disposing an already disposed scope is a no-op. A scope disposed
    /// before its parent is unlinked from it.
    pub fn dispose_scope(&self, scope: ScopeId) {
        let removed = {
            let mut state = self.state();
            let removed = state.scopes.remove(scope.index());
            if let Some(parent) = removed.as_ref().and_then(Scope::parent) {
                if let Some(parent) = state.scopes.get_mut(parent.index()) {
                    parent.forget(scope);
                }
            }
            removed
        };
        let Some(removed) = removed else {
            return;
        };
        trace!(runtime = %self.inner.id, %scope, "disposing scope");

        for disposer in removed.into_release_order() {
            match disposer {
                Disposer::Cleanup(cleanup) => cleanup(),
                Disposer::Scope(child) => self.dispose_scope(child),
                Disposer::Node(node) => self.dispose_node(node),
            }
        }
    }

    /// Dispose the whole graph. All cleanups run and every handle created by
    /// this runtime reports [`ReactiveError::Disposed`] afterwards.
    pub fn dispose(&self) {
        let root = {
            let mut state = self.state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.root
        };
        debug!(runtime = %self.inner.id, "runtime disposed");
        self.dispose_scope(root);
    }

    /// Run `f` without recording any reads as dependencies.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let context = ReactiveContext::enter(self, None, None);
        let result = f();
        context.finish();
        result
    }

    // ---- Batching & propagation ----

    /// Group writes so dependents observe them as one change.
    ///
    /// Nested batches flatten into the outermost one. Memos read inside the
    /// batch may still return pre-batch values; effects run once, after the
    /// outermost batch ends.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R, ReactiveError> {
        self.state().batch_depth += 1;
        let guard = BatchGuard { runtime: self };
        let result = f();
        drop(guard);

        self.flush()?;
        Ok(result)
    }

    /// Propagate pending writes and run queued effects until the graph settles.
    fn flush(&self) -> Result<(), ReactiveError> {
        {
            let mut state = self.state();
            if state.batch_depth > 0 || state.flushing {
                return Ok(());
            }
            state.flushing = true;
        }
        let _flushing = FlushGuard { runtime: self };

        let limit = self.inner.config.max_flush_iterations;
        let mut runs = 0usize;
        loop {
            let next = {
                let mut state = self.state();
                state.propagate();
                state.queue.shift_remove_index(0)
            };
            let Some(effect) = next else {
                break;
            };

            runs += 1;
            if runs > limit {
                let mut state = self.state();
                state.queue.clear();
                state.pending.clear();
                warn!(runtime = %self.inner.id, limit, "effects did not settle");
                return Err(ReactiveError::FlushLimitExceeded { iterations: limit });
            }

            if let Err(error) = self.run_effect(effect) {
                self.state().queue.clear();
                return Err(error);
            }
        }

        if runs > 0 {
            trace!(runtime = %self.inner.id, runs, "flush settled");
        }
        Ok(())
    }

    /// Bring a node's dirty flag up to date.
    ///
    /// Returns `true` if the node must re-execute. A maybe-dirty node updates
    /// its memo inputs; if none of them produced a new value it becomes clean
    /// without executing.
    fn resolve(&self, id: NodeId) -> Result<bool, ReactiveError> {
        let (dirty, dependencies) = {
            let state = self.state();
            let node = state.graph.get_node(id).ok_or(ReactiveError::Disposed { node: id })?;
            let dependencies: SmallVec<[NodeId; 8]> = node.sources().iter().copied().collect();
            (node.state(), dependencies)
        };

        match dirty {
            DirtyState::Clean => return Ok(false),
            DirtyState::Dirty => return Ok(true),
            DirtyState::MaybeDirty => {}
        }

        for dependency in dependencies {
            let is_memo = self
                .state()
                .graph
                .get_node(dependency)
                .is_some_and(|node| node.kind() == NodeKind::Derived);
            if is_memo {
                self.update_memo(dependency)?;
            }
            if self.dirty_state(id)? == DirtyState::Dirty {
                return Ok(true);
            }
        }

        if let Some(node) = self.state().graph.get_node_mut(id) {
            node.settle();
        }
        Ok(false)
    }

    fn update_memo(&self, id: NodeId) -> Result<(), ReactiveError> {
        if self.state().tracking.contains(id) {
            return Err(ReactiveError::CyclicDependency { node: id });
        }
        if self.resolve(id)? {
            self.recompute_memo(id)?;
        }
        Ok(())
    }

    fn recompute_memo(&self, id: NodeId) -> Result<(), ReactiveError> {
        let compute = match self.state().graph.payload(id) {
            Some(Payload::Memo { compute, .. }) => Arc::clone(compute),
            Some(_) => return Err(ReactiveError::TypeMismatch { node: id }),
            None => return Err(ReactiveError::Disposed { node: id }),
        };

        let context = ReactiveContext::enter(self, Some(id), None);
        let result = compute();
        let dependencies = context.finish();

        let mut state = self.state();
        if !state.graph.contains(id) {
            return Err(ReactiveError::Disposed { node: id });
        }
        state.graph.replace_sources(id, dependencies);
        let new = result?;

        let changed = match state.graph.payload_mut(id) {
            Some(Payload::Memo { value, equals, .. }) => {
                let changed = match value {
                    Some(old) => !equals(&**old, &*new),
                    None => true,
                };
                if changed {
                    *value = Some(new);
                }
                changed
            }
            _ => return Err(ReactiveError::TypeMismatch { node: id }),
        };

        let dependents = match state.graph.get_node_mut(id) {
            Some(node) => {
                node.settle();
                node.observers().clone()
            }
            None => IndexSet::new(),
        };
        if changed {
            for dependent in dependents {
                if let Some(node) = state.graph.get_node_mut(dependent) {
                    node.invalidate();
                }
            }
        }
        trace!(node = %id, changed, "memo recomputed");
        Ok(())
    }

    // ---- Cell access ----

    pub(crate) fn read_signal<T: Clone + 'static>(&self, id: NodeId, track: bool) -> Result<T, ReactiveError> {
        let mut state = self.state();
        let value = match state.graph.payload(id) {
            Some(Payload::Signal { value, .. }) => value
                .downcast_ref::<T>()
                .cloned()
                .ok_or(ReactiveError::TypeMismatch { node: id })?,
            Some(_) => return Err(ReactiveError::TypeMismatch { node: id }),
            None => return Err(ReactiveError::Disposed { node: id }),
        };
        if track {
            state.tracking.track(id);
        }
        Ok(value)
    }

    /// Store a new signal value. Equal values are ignored; otherwise
    /// dependents are invalidated, immediately or when the batch ends.
    pub(crate) fn write_signal<T: Send + 'static>(&self, id: NodeId, new: T) -> Result<(), ReactiveError> {
        let old = {
            let mut state = self.state();
            let old = match state.graph.payload_mut(id) {
                Some(Payload::Signal { value, equals }) => {
                    if !value.is::<T>() {
                        return Err(ReactiveError::TypeMismatch { node: id });
                    }
                    if equals(&**value, &new) {
                        trace!(node = %id, "write ignored: value unchanged");
                        return Ok(());
                    }
                    std::mem::replace(value, Box::new(new))
                }
                Some(_) => return Err(ReactiveError::TypeMismatch { node: id }),
                None => return Err(ReactiveError::Disposed { node: id }),
            };
            state.pending.insert(id);
            old
        };
        drop(old);

        self.flush()
    }

    pub(crate) fn read_memo<T: Clone + 'static>(&self, id: NodeId, track: bool) -> Result<T, ReactiveError> {
        {
            let mut state = self.state();
            if !state.graph.contains(id) {
                return Err(ReactiveError::Disposed { node: id });
            }
            if state.tracking.contains(id) {
                debug!(node = %id, "memo read itself while computing");
                return Err(ReactiveError::CyclicDependency { node: id });
            }
            if track {
                state.tracking.track(id);
            }
        }

        self.update_memo(id)?;

        let state = self.state();
        match state.graph.payload(id) {
            Some(Payload::Memo { value: Some(value), .. }) => value
                .downcast_ref::<T>()
                .cloned()
                .ok_or(ReactiveError::TypeMismatch { node: id }),
            Some(Payload::Memo { value: None, .. }) | None => Err(ReactiveError::Disposed { node: id }),
            Some(_) => Err(ReactiveError::TypeMismatch { node: id }),
        }
    }

    pub(crate) fn memo_has_value(&self, id: NodeId) -> bool {
        matches!(self.state().graph.payload(id), Some(Payload::Memo { value: Some(_), .. }))
    }

    // ---- Effects & observers ----

    /// Execute an effect if its inputs changed.
    ///
    /// The previous run's cleanups fire first, then the effect runs inside a
    /// fresh scope and its dependency set is replaced by what it read.
    pub(crate) fn run_effect(&self, id: NodeId) -> Result<(), ReactiveError> {
        if !self.contains(id) || !self.resolve(id)? {
            return Ok(());
        }

        let (run, previous) = match self.state().graph.payload_mut(id) {
            Some(Payload::Effect { run, scope, .. }) => (Arc::clone(run), scope.take()),
            Some(_) => return Err(ReactiveError::TypeMismatch { node: id }),
            None => return Ok(()),
        };
        if let Some(previous) = previous {
            self.dispose_scope(previous);
        }

        let scope = self.create_detached_scope();
        let context = ReactiveContext::enter(self, Some(id), Some(scope));
        let result = run();
        let dependencies = context.finish();

        let orphaned = {
            let mut state = self.state();
            match state.graph.payload_mut(id) {
                Some(Payload::Effect { scope: slot, runs, .. }) => {
                    *slot = Some(scope);
                    *runs += 1;
                    state.graph.replace_sources(id, dependencies);
                    if let Some(node) = state.graph.get_node_mut(id) {
                        node.settle();
                    }
                    None
                }
                // The effect disposed itself while running.
                _ => Some(scope),
            }
        };
        if let Some(scope) = orphaned {
            self.dispose_scope(scope);
        }

        trace!(node = %id, "effect executed");
        result
    }

    pub(crate) fn effect_runs(&self, id: NodeId) -> u64 {
        match self.state().graph.payload(id) {
            Some(Payload::Effect { runs, .. }) => *runs,
            _ => 0,
        }
    }

    /// Run `f` while recording its reads as the dependencies of `observer`.
    pub(crate) fn track_observer<R>(&self, observer: NodeId, f: impl FnOnce() -> R) -> Result<R, ReactiveError> {
        if !self.contains(observer) {
            return Err(ReactiveError::Disposed { node: observer });
        }

        let context = ReactiveContext::enter(self, Some(observer), None);
        let result = f();
        let dependencies = context.finish();

        let mut state = self.state();
        state.graph.replace_sources(observer, dependencies);
        if let Some(node) = state.graph.get_node_mut(observer) {
            node.settle();
        }
        Ok(result)
    }

    /// Whether any input of `observer` produced a new value since it was
    /// last tracked.
    pub(crate) fn observer_is_stale(&self, observer: NodeId) -> Result<bool, ReactiveError> {
        self.resolve(observer)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").field("id", &self.inner.id).finish_non_exhaustive()
    }
}

struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.runtime.state();
        state.batch_depth = state.batch_depth.saturating_sub(1);
    }
}

struct FlushGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.runtime.state().flushing = false;
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Memo, Signal};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn runtimes_are_isolated() {
        let first = Runtime::new();
        let second = Runtime::new();
        assert_ne!(first.id(), second.id());

        let signal = Signal::new(&first, 1);
        assert_eq!(first.node_count(), 1);
        assert_eq!(second.node_count(), 0);
        assert_eq!(signal.get().unwrap(), 1);
    }

    #[test]
    fn batch_coalesces_writes() {
        let runtime = Runtime::new();
        let a = Signal::new(&runtime, 0);
        let b = Signal::new(&runtime, 0);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let (a2, b2) = (a.clone(), b.clone());
        let _effect = Effect::new(&runtime, move || {
            a2.get()?;
            b2.get()?;
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        runtime
            .batch(|| {
                a.set(1).unwrap();
                b.set(2).unwrap();
                a.set(3).unwrap();
            })
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn nested_batches_flatten() {
        let runtime = Runtime::new();
        let a = Signal::new(&runtime, 0);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let a2 = a.clone();
        let _effect = Effect::new(&runtime, move || {
            a2.get()?;
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        runtime
            .batch(|| {
                a.set(1).unwrap();
                runtime.batch(|| a.set(2).unwrap()).unwrap();
                assert!(runtime.is_batching());
                // Inner batch end must not flush.
                assert_eq!(runs.load(Ordering::SeqCst), 1);
            })
            .unwrap();

        assert!(!runtime.is_batching());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unchanged_memo_stops_propagation() {
        let runtime = Runtime::new();
        let n = Signal::new(&runtime, 1);
        let n2 = n.clone();
        let parity = Memo::new(&runtime, move || Ok(n2.get()? % 2));
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let parity2 = parity.clone();
        let _effect = Effect::new(&runtime, move || {
            parity2.get()?;
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        n.set(3).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        n.set(4).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn runaway_effects_hit_flush_limit() {
        let runtime = Runtime::with_config(ReactiveConfig {
            max_flush_iterations: 50,
        });
        let counter = Signal::new(&runtime, 0u64);

        let counter2 = counter.clone();
        let _effect = Effect::new(&runtime, move || {
            let value = counter2.get()?;
            counter2.set(value + 1)
        });

        let result = counter.set(1_000);
        assert!(matches!(
            result,
            Err(ReactiveError::FlushLimitExceeded { iterations: 50 })
        ));
    }

    #[test]
    fn dispose_scope_runs_cleanups_in_reverse() {
        let runtime = Runtime::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let scope = runtime.create_scope();

        runtime.run_in_scope(scope, || {
            for label in ["first", "second", "third"] {
                let order = order.clone();
                runtime.on_cleanup(move || order.lock().push(label));
            }
        });

        runtime.dispose_scope(scope);
        assert_eq!(*order.lock(), vec!["third", "second", "first"]);

        // Disposing twice is a no-op.
        runtime.dispose_scope(scope);
        assert_eq!(order.lock().len(), 3);
    }

    #[test]
    fn dispose_scope_removes_owned_nodes() {
        let runtime = Runtime::new();
        let scope = runtime.create_scope();

        let signal = runtime.run_in_scope(scope, || Signal::new(&runtime, 5));
        assert_eq!(runtime.node_count(), 1);

        runtime.dispose_scope(scope);
        assert_eq!(runtime.node_count(), 0);
        assert_eq!(signal.get(), Err(ReactiveError::Disposed { node: signal.id() }));
    }

    #[test]
    fn disposed_child_scopes_leave_their_parent() {
        let runtime = Runtime::new();
        let baseline = runtime.root_resource_count();

        for _ in 0..100 {
            let scope = runtime.create_scope();
            runtime.run_in_scope(scope, || runtime.on_cleanup(|| {}));
            runtime.dispose_scope(scope);
        }
        assert_eq!(runtime.root_resource_count(), baseline);
        assert_eq!(runtime.scope_count(), 1);

        // Nested scopes unlink from the scope that created them.
        let outer = runtime.create_scope();
        let inner = runtime.run_in_scope(outer, || runtime.create_scope());
        runtime.dispose_scope(inner);
        assert_eq!(runtime.scope_count(), 2);
        runtime.dispose_scope(outer);
        assert_eq!(runtime.root_resource_count(), baseline);
    }

    #[test]
    fn untrack_skips_dependency() {
        let runtime = Runtime::new();
        let tracked = Signal::new(&runtime, 0);
        let hidden = Signal::new(&runtime, 0);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let (tracked2, hidden2, rt) = (tracked.clone(), hidden.clone(), runtime.clone());
        let _effect = Effect::new(&runtime, move || {
            tracked2.get()?;
            rt.untrack(|| hidden2.get())?;
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        hidden.set(1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tracked.set(1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn runtime_dispose_is_idempotent() {
        let runtime = Runtime::new();
        let cleaned = Arc::new(AtomicI32::new(0));

        let cleaned_clone = cleaned.clone();
        runtime.on_cleanup(move || {
            cleaned_clone.fetch_add(1, Ordering::SeqCst);
        });
        let _signal = Signal::new(&runtime, "x".to_string());

        runtime.dispose();
        runtime.dispose();

        assert!(runtime.is_disposed());
        assert_eq!(runtime.node_count(), 0);
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }
}
