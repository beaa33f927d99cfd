//! Ownership scopes.
//!
//! A scope owns the reactive nodes, child scopes and cleanup actions created
//! while it was the current owner. Disposing a scope releases everything it
//! owns in reverse acquisition order.

use std::fmt;

use crate::graph::{Index, NodeId};

/// Identifier of a scope inside a [`super::Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(Index);

impl ScopeId {
    pub(crate) fn from_index(index: Index) -> Self {
        Self(index)
    }

    pub(crate) fn index(&self) -> Index {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// One resource held by a scope.
pub(crate) enum Disposer {
    Node(NodeId),
    Scope(ScopeId),
    Cleanup(Box<dyn FnOnce() + Send>),
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposer::Node(id) => f.debug_tuple("Node").field(id).finish(),
            Disposer::Scope(id) => f.debug_tuple("Scope").field(id).finish(),
            Disposer::Cleanup(_) => f.write_str("Cleanup(..)"),
        }
    }
}

/// The disposer list of a scope, in acquisition order.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    /// The scope holding a `Disposer::Scope` entry for this one, if any.
    parent: Option<ScopeId>,
    disposers: Vec<Disposer>,
}

impl Scope {
    pub(crate) fn child_of(parent: ScopeId) -> Self {
        Self {
            parent: Some(parent),
            disposers: Vec::new(),
        }
    }

    pub(crate) fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub(crate) fn push(&mut self, disposer: Disposer) {
        self.disposers.push(disposer);
    }

    /// Drop the entry for a child scope that was disposed on its own.
    pub(crate) fn forget(&mut self, child: ScopeId) {
        if let Some(position) = self
            .disposers
            .iter()
            .rposition(|disposer| matches!(disposer, Disposer::Scope(id) if *id == child))
        {
            self.disposers.remove(position);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.disposers.len()
    }

    /// Hand out the disposers in the order they must run: newest first.
    pub(crate) fn into_release_order(self) -> impl Iterator<Item = Disposer> {
        self.disposers.into_iter().rev()
    }
}
