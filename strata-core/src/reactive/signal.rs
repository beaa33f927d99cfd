//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    read is recorded as a dependency of that context.
//!
//! 2. When a signal is written with a value that differs from the current
//!    one, all dependents are invalidated.
//!
//! 3. Invalidation triggers re-execution of dependent effects. Writing an
//!    equal value does nothing.
//!
//! # Ownership
//!
//! The value itself lives in the [`Runtime`]'s graph. A `Signal<T>` is only
//! a typed handle (runtime + node id) and is cheap to clone. Once the signal
//! is disposed, every operation on the handle returns
//! [`ReactiveError::Disposed`].

use std::fmt;
use std::marker::PhantomData;

use super::runtime::{equality, equality_with, Payload, Runtime};
use crate::error::ReactiveError;
use crate::graph::{NodeId, NodeKind};

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let count = Signal::new(&runtime, 0);
///
/// // Read the value
/// let value = count.get()?;
///
/// // Update the value (notifies dependents)
/// count.set(5)?;
/// ```
pub struct Signal<T> {
    runtime: Runtime,
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Signal<T>
where
    T: Clone + Send + 'static,
{
    /// Create a new signal with the given initial value.
    ///
    /// Writes are compared with `PartialEq`; writing an equal value does not
    /// notify anyone.
    pub fn new(runtime: &Runtime, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_payload(runtime, value, equality::<T>())
    }

    /// Create a signal with a custom equality predicate.
    pub fn with_equals<F>(runtime: &Runtime, value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self::with_payload(runtime, value, equality_with(equals))
    }

    /// Create a signal that notifies on every write.
    pub fn always_notify(runtime: &Runtime, value: T) -> Self {
        Self::with_equals(runtime, value, |_, _| false)
    }

    fn with_payload(runtime: &Runtime, value: T, equals: super::runtime::EqualsFn) -> Self {
        let id = runtime.create_node(
            NodeKind::Source,
            Payload::Signal {
                value: Box::new(value),
                equals,
            },
        );
        Self {
            runtime: runtime.clone(),
            id,
            _marker: PhantomData,
        }
    }

    /// Get the signal's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the runtime this signal belongs to.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> Result<T, ReactiveError> {
        self.runtime.read_signal(self.id, true)
    }

    /// Get the current value without tracking dependencies.
    ///
    /// Use this when you need to read the value without establishing
    /// a reactive dependency.
    pub fn get_untracked(&self) -> Result<T, ReactiveError> {
        self.runtime.read_signal(self.id, false)
    }

    /// Set a new value and notify dependents.
    ///
    /// Outside of a batch this runs every affected effect before returning.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        self.runtime.write_signal(self.id, value)
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get_untracked()?;
        self.set(f(&current))
    }

    /// Remove the signal from its graph. Further access fails with
    /// [`ReactiveError::Disposed`].
    pub fn dispose(&self) {
        self.runtime.dispose_node(self.id);
    }

    /// Whether the signal has been disposed.
    pub fn is_disposed(&self) -> bool {
        !self.runtime.contains(self.id)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.runtime.id() == other.runtime.id()
    }
}

impl<T> Eq for Signal<T> {}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("runtime", &self.runtime.id())
            .field("id", &self.id)
            .finish()
    }
}

// ---- Tests ----
