//! Observers
//!
//! An observer records the cells read by a piece of code without ever being
//! scheduled. Its owner decides when to re-run it by polling
//! [`Observer::is_stale`]. Sessions use one to track their render function:
//! after a batch of events they ask whether any input of the last render
//! produced a new value, and only then render again.

use std::fmt;

use super::runtime::{Payload, Runtime};
use crate::error::ReactiveError;
use crate::graph::{NodeId, NodeKind};

/// A polled, never-scheduled dependency tracker.
#[derive(Clone)]
pub struct Observer {
    runtime: Runtime,
    id: NodeId,
}

impl Observer {
    /// Create an observer. It starts stale.
    pub fn new(runtime: &Runtime) -> Self {
        let id = runtime.create_node(NodeKind::Observer, Payload::Observer);
        Self {
            runtime: runtime.clone(),
            id,
        }
    }

    /// Get the observer's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Run `f`, replacing the observer's dependencies with what `f` reads.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> Result<R, ReactiveError> {
        self.runtime.track_observer(self.id, f)
    }

    /// Whether an input read by the last [`Observer::track`] has changed.
    ///
    /// Inputs that were invalidated but recomputed to an equal value do not
    /// make the observer stale.
    pub fn is_stale(&self) -> Result<bool, ReactiveError> {
        self.runtime.observer_is_stale(self.id)
    }

    /// Remove the observer from its graph.
    pub fn dispose(&self) {
        self.runtime.dispose_node(self.id);
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("runtime", &self.runtime.id())
            .field("id", &self.id)
            .finish()
    }
}
