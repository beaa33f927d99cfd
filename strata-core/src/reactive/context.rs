//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] keeps a stack of tracking frames. When entering a reactive
//! context (e.g., running a memo or effect), we push a frame for the
//! subscriber. When the computation completes, we pop it and hand the
//! collected dependencies to the graph.
//!
//! This design supports nested reactive contexts (e.g., a memo that reads
//! from another memo), and lets cycle detection ask whether a memo is
//! already somewhere on the stack.
//!
//! A second stack records the owner scope that newly created nodes and
//! cleanups are attached to.

use indexmap::IndexSet;

use super::runtime::Runtime;
use super::scope::ScopeId;
use crate::graph::NodeId;

/// An entry in the tracking stack.
#[derive(Debug)]
struct Frame {
    /// The computation being evaluated. `None` marks an untracked section.
    observer: Option<NodeId>,
    /// Cells read during this evaluation, in first-read order.
    dependencies: IndexSet<NodeId>,
}

/// The stack of computations currently being evaluated.
#[derive(Debug, Default)]
pub(crate) struct TrackingStack {
    frames: Vec<Frame>,
}

impl TrackingStack {
    pub(crate) fn push(&mut self, observer: Option<NodeId>) {
        self.frames.push(Frame {
            observer,
            dependencies: IndexSet::new(),
        });
    }

    fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Record a read of `cell` in the innermost frame.
    pub(crate) fn track(&mut self, cell: NodeId) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.observer.is_some() {
                frame.dependencies.insert(cell);
            }
        }
    }

    /// The computation currently collecting dependencies, if any.
    pub(crate) fn current(&self) -> Option<NodeId> {
        self.frames.last().and_then(|frame| frame.observer)
    }

    /// Whether `node` is being evaluated somewhere on the stack.
    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.frames.iter().any(|frame| frame.observer == Some(node))
    }
}

/// Guard that pops the context when dropped.
///
/// This ensures the stacks are properly maintained even if the computation
/// panics. Call [`ReactiveContext::finish`] to collect the dependencies.
pub(crate) struct ReactiveContext<'a> {
    runtime: &'a Runtime,
    observer: Option<NodeId>,
    owns_scope: bool,
    finished: bool,
}

impl<'a> ReactiveContext<'a> {
    /// Enter a new reactive context for `observer`.
    ///
    /// While this context is active, any cell that is read is recorded as a
    /// dependency of `observer`. When `owner` is given, nodes created inside
    /// the context are owned by that scope.
    pub(crate) fn enter(runtime: &'a Runtime, observer: Option<NodeId>, owner: Option<ScopeId>) -> Self {
        {
            let mut state = runtime.state();
            state.tracking.push(observer);
            if let Some(owner) = owner {
                state.owners.push(owner);
            }
        }

        Self {
            runtime,
            observer,
            owns_scope: owner.is_some(),
            finished: false,
        }
    }

    /// Leave the context and return the dependencies read inside it.
    pub(crate) fn finish(mut self) -> IndexSet<NodeId> {
        self.finished = true;
        self.exit()
    }

    fn exit(&self) -> IndexSet<NodeId> {
        let mut state = self.runtime.state();
        if self.owns_scope {
            state.owners.pop();
        }

        match state.tracking.pop() {
            Some(frame) => {
                // Verify we're popping the right context.
                debug_assert_eq!(
                    frame.observer, self.observer,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.observer, frame.observer
                );
                frame.dependencies
            }
            None => IndexSet::new(),
        }
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.exit();
        }
    }
}

/// Guard that makes a scope the owner of newly created nodes until dropped.
pub(crate) struct OwnerGuard<'a> {
    runtime: &'a Runtime,
}

impl<'a> OwnerGuard<'a> {
    pub(crate) fn enter(runtime: &'a Runtime, scope: ScopeId) -> Self {
        runtime.state().owners.push(scope);
        Self { runtime }
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.runtime.state().owners.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn context_tracks_subscriber() {
        let runtime = Runtime::new();
        let observer = Signal::new(&runtime, 0).id();

        assert!(runtime.state().tracking.current().is_none());

        {
            let _ctx = ReactiveContext::enter(&runtime, Some(observer), None);
            assert_eq!(runtime.state().tracking.current(), Some(observer));
        }

        // Context should be cleaned up after drop
        assert!(runtime.state().tracking.current().is_none());
    }

    #[test]
    fn context_collects_dependencies_in_read_order() {
        let runtime = Runtime::new();
        let observer = Signal::new(&runtime, ()).id();
        let a = Signal::new(&runtime, 1);
        let b = Signal::new(&runtime, 2);

        let ctx = ReactiveContext::enter(&runtime, Some(observer), None);
        b.get().unwrap();
        a.get().unwrap();
        b.get().unwrap();
        let deps = ctx.finish();

        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec![b.id(), a.id()]);
    }

    #[test]
    fn nested_contexts() {
        let runtime = Runtime::new();
        let outer = Signal::new(&runtime, ()).id();
        let inner = Signal::new(&runtime, ()).id();

        let outer_ctx = ReactiveContext::enter(&runtime, Some(outer), None);
        {
            let _inner_ctx = ReactiveContext::enter(&runtime, Some(inner), None);
            assert_eq!(runtime.state().tracking.current(), Some(inner));
            assert!(runtime.state().tracking.contains(outer));
        }

        // After inner context drops, outer should be current
        assert_eq!(runtime.state().tracking.current(), Some(outer));
        outer_ctx.finish();
        assert!(runtime.state().tracking.current().is_none());
    }

    #[test]
    fn untracked_frames_collect_nothing() {
        let runtime = Runtime::new();
        let a = Signal::new(&runtime, 1);

        let ctx = ReactiveContext::enter(&runtime, None, None);
        a.get().unwrap();
        assert!(ctx.finish().is_empty());
    }
}
