//! Graph vertices: ids, kinds and freshness.

use std::fmt;

use indexmap::IndexSet;

use super::arena::Index;

/// Identifier of a vertex in a session's dependency graph.
///
/// Ids are generation-tagged: once a vertex is disposed its id stops
/// resolving, even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Index);

impl NodeId {
    pub(crate) fn from_index(index: Index) -> Self {
        Self(index)
    }

    pub(crate) fn index(&self) -> Index {
        self.0
    }

    /// Packed slot and generation, for logs and external maps.
    pub fn raw(&self) -> u64 {
        self.0.to_bits()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// What a vertex stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A signal. Only ever read from.
    Source,
    /// A memo: reads other vertices and caches a value.
    Derived,
    /// An effect. Re-run by the runtime after a propagation pass.
    Effect,
    /// Tracked but never scheduled, such as a session's render function.
    /// Its owner polls it for staleness instead.
    Observer,
}

impl NodeKind {
    /// Sinks never appear on the source side of an edge.
    pub fn is_sink(&self) -> bool {
        matches!(self, NodeKind::Effect | NodeKind::Observer)
    }
}

/// How fresh a vertex's last result is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    /// Something upstream changed; the direct sources must be checked before
    /// deciding whether to recompute.
    MaybeDirty,
    /// A direct source changed.
    Dirty,
}

/// A vertex and its edges in both directions.
///
/// Edge sets keep insertion order, which makes effect scheduling
/// deterministic.
#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    state: DirtyState,
    /// Vertices read during the last run.
    sources: IndexSet<NodeId>,
    /// Vertices whose last run read this one.
    observers: IndexSet<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        let state = match kind {
            NodeKind::Source => DirtyState::Clean,
            // Never ran, so there is nothing cached yet.
            NodeKind::Derived | NodeKind::Effect | NodeKind::Observer => DirtyState::Dirty,
        };
        Self {
            kind,
            state,
            sources: IndexSet::new(),
            observers: IndexSet::new(),
        }
    }

    pub fn signal() -> Self {
        Self::new(NodeKind::Source)
    }

    pub fn memo() -> Self {
        Self::new(NodeKind::Derived)
    }

    pub fn effect() -> Self {
        Self::new(NodeKind::Effect)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn state(&self) -> DirtyState {
        self.state
    }

    pub fn is_clean(&self) -> bool {
        self.state == DirtyState::Clean
    }

    /// The last result is current.
    pub fn settle(&mut self) {
        self.state = DirtyState::Clean;
    }

    /// Flag for a check of the direct sources. A dirty vertex stays dirty.
    pub fn suspect(&mut self) {
        if self.state == DirtyState::Clean {
            self.state = DirtyState::MaybeDirty;
        }
    }

    pub fn invalidate(&mut self) {
        self.state = DirtyState::Dirty;
    }

    pub fn add_source(&mut self, id: NodeId) {
        self.sources.insert(id);
    }

    pub fn remove_source(&mut self, id: NodeId) {
        self.sources.shift_remove(&id);
    }

    pub fn sources(&self) -> &IndexSet<NodeId> {
        &self.sources
    }

    /// Detach every source edge on this side, returning the old set.
    pub fn take_sources(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.sources)
    }

    pub fn add_observer(&mut self, id: NodeId) {
        self.observers.insert(id);
    }

    pub fn remove_observer(&mut self, id: NodeId) {
        self.observers.shift_remove(&id);
    }

    pub fn observers(&self) -> &IndexSet<NodeId> {
        &self.observers
    }
}

// ---- Tests ----
