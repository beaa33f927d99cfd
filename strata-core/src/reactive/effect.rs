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
//! 2. When any dependency changes, the effect is queued to re-run once the
//!    current write (or batch) completes.
//!
//! 3. Each run replaces the old dependency set with the cells read during
//!    that run.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Each run executes inside its own scope. Cleanups registered with
//! [`Runtime::on_cleanup`] during a run fire before the next run and when the
//! effect is disposed, in reverse registration order. Signals and effects
//! created during a run are disposed the same way.

use std::fmt;
use std::sync::Arc;

use super::runtime::{Payload, Runtime, RunFn};
use crate::error::ReactiveError;
use crate::graph::{NodeId, NodeKind};

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(&runtime, 0);
///
/// let effect = Effect::new(&runtime, {
///     let count = count.clone();
///     move || {
///         println!("Count is: {}", count.get()?);
///         Ok(())
///     }
/// })?;
///
/// count.set(5)?;  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    runtime: Runtime,
    id: NodeId,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish dependencies. If that first
    /// run fails, the effect is disposed and the error returned.
    pub fn new<F>(runtime: &Runtime, run: F) -> Result<Self, ReactiveError>
    where
        F: Fn() -> Result<(), ReactiveError> + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(runtime, run);
        if let Err(error) = effect.execute() {
            effect.dispose();
            return Err(error);
        }
        Ok(effect)
    }

    /// Create a new effect without running it immediately.
    ///
    /// The effect has no dependencies until [`Effect::execute`] is called.
    pub fn new_lazy<F>(runtime: &Runtime, run: F) -> Self
    where
        F: Fn() -> Result<(), ReactiveError> + Send + Sync + 'static,
    {
        let run: RunFn = Arc::new(run);
        let id = runtime.create_node(
            NodeKind::Effect,
            Payload::Effect {
                run,
                scope: None,
                runs: 0,
            },
        );
        Self {
            runtime: runtime.clone(),
            id,
        }
    }

    /// Get the effect's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Execute the effect function if it is dirty.
    ///
    /// This runs the function within a reactive context to track dependencies.
    pub fn execute(&self) -> Result<(), ReactiveError> {
        self.runtime.run_effect(self.id)
    }

    /// Get the number of times this effect has run.
    pub fn run_count(&self) -> u64 {
        self.runtime.effect_runs(self.id)
    }

    /// Dispose the effect, running its cleanups.
    ///
    /// After disposal, the effect will no longer run.
    pub fn dispose(&self) {
        self.runtime.dispose_node(self.id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !self.runtime.contains(self.id)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("runtime", &self.runtime.id())
            .field("id", &self.id)
            .finish()
    }
}

// ---- Tests ----
