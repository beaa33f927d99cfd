//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a signal it reads changes, the memo is marked dirty; when a memo it
//!    reads may have changed, it is marked "maybe dirty".
//!
//! 4. On next access, a maybe-dirty memo first brings its memo inputs up to
//!    date. If none of them produced a new value, it is marked clean and the
//!    cache is returned without recomputing.
//!
//! 5. A recomputation that yields a value equal to the cached one keeps the
//!    cache and does not invalidate the memo's own dependents.
//!
//! A memo that (transitively) reads itself fails with
//! [`ReactiveError::CyclicDependency`] before producing any value.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::runtime::{equality, equality_with, ComputeFn, EqualsFn, Payload, Runtime, Value};
use crate::error::ReactiveError;
use crate::graph::{DirtyState, NodeId, NodeKind};

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(&runtime, 2);
/// let doubled = Memo::new(&runtime, {
///     let count = count.clone();
///     move || Ok(count.get()? * 2)
/// });
/// assert_eq!(doubled.get()?, 4);
/// ```
pub struct Memo<T> {
    runtime: Runtime,
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Memo<T>
where
    T: Clone + Send + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        T: PartialEq,
        F: Fn() -> Result<T, ReactiveError> + Send + Sync + 'static,
    {
        Self::with_payload(runtime, compute, equality::<T>())
    }

    /// Create a memo whose change detection uses `equals`.
    pub fn with_equals<F, E>(runtime: &Runtime, compute: F, equals: E) -> Self
    where
        F: Fn() -> Result<T, ReactiveError> + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self::with_payload(runtime, compute, equality_with(equals))
    }

    fn with_payload<F>(runtime: &Runtime, compute: F, equals: EqualsFn) -> Self
    where
        F: Fn() -> Result<T, ReactiveError> + Send + Sync + 'static,
    {
        let compute: ComputeFn = Arc::new(move || compute().map(|value| Box::new(value) as Value));
        let id = runtime.create_node(
            NodeKind::Derived,
            Payload::Memo {
                value: None,
                compute,
                equals,
            },
        );
        Self {
            runtime: runtime.clone(),
            id,
            _marker: PhantomData,
        }
    }

    /// Get the memo's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a memo's value. Inside a
    /// reactive context the memo is recorded as a dependency.
    pub fn get(&self) -> Result<T, ReactiveError> {
        self.runtime.read_memo(self.id, true)
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> Result<T, ReactiveError> {
        self.runtime.read_memo(self.id, false)
    }

    /// Get the current dirty state.
    pub fn state(&self) -> Result<DirtyState, ReactiveError> {
        self.runtime.dirty_state(self.id)
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.runtime.memo_has_value(self.id)
    }

    /// Remove the memo from its graph.
    pub fn dispose(&self) {
        self.runtime.dispose_node(self.id);
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("runtime", &self.runtime.id())
            .field("id", &self.id)
            .finish()
    }
}

// ---- Tests ----
