//! Update Scheduler
//!
//! Owns a session's vertices and edges and decides the order in which
//! invalidated vertices are visited.
//!
//! A write pushes: direct observers of the changed signal become dirty,
//! everything further downstream maybe-dirty, and the affected set comes back
//! in topological order (sources first). Reads then pull: a maybe-dirty memo
//! checks its sources and recomputes only if one of them produced a new
//! value.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;

use super::arena::Arena;
use super::node::{Node, NodeId};

#[derive(Debug)]
struct Slot<P> {
    node: Node,
    payload: P,
}

/// Vertex storage plus push-side propagation.
///
/// `P` is the per-vertex payload stored next to the topology: values,
/// computations, effect state.
#[derive(Debug)]
pub struct UpdateScheduler<P> {
    nodes: Arena<Slot<P>>,
}

impl<P> UpdateScheduler<P> {
    pub fn new() -> Self {
        Self { nodes: Arena::new() }
    }

    pub fn add_node(&mut self, node: Node, payload: P) -> NodeId {
        NodeId::from_index(self.nodes.insert(Slot { node, payload }))
    }

    /// Remove a vertex and every edge touching it, returning its payload.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<P> {
        let slot = self.nodes.remove(node_id.index())?;

        for &source in slot.node.sources() {
            if let Some(node) = self.get_node_mut(source) {
                node.remove_observer(node_id);
            }
        }
        for &observer in slot.node.observers() {
            if let Some(node) = self.get_node_mut(observer) {
                node.remove_source(node_id);
            }
        }

        Some(slot.payload)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains(node_id.index())
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(node_id.index()).map(|slot| &slot.node)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id.index()).map(|slot| &mut slot.node)
    }

    pub fn payload(&self, node_id: NodeId) -> Option<&P> {
        self.nodes.get(node_id.index()).map(|slot| &slot.payload)
    }

    pub fn payload_mut(&mut self, node_id: NodeId) -> Option<&mut P> {
        self.nodes.get_mut(node_id.index()).map(|slot| &mut slot.payload)
    }

    /// Record that `observer` read `source`. Ignored if either is gone.
    pub fn add_edge(&mut self, source: NodeId, observer: NodeId) {
        if !self.contains(source) || !self.contains(observer) {
            return;
        }
        if let Some(node) = self.get_node_mut(source) {
            node.add_observer(observer);
        }
        if let Some(node) = self.get_node_mut(observer) {
            node.add_source(source);
        }
    }

    pub fn remove_edge(&mut self, source: NodeId, observer: NodeId) {
        if let Some(node) = self.get_node_mut(source) {
            node.remove_observer(observer);
        }
        if let Some(node) = self.get_node_mut(observer) {
            node.remove_source(source);
        }
    }

    /// Swap the source set of `node_id` for the reads of its latest run.
    pub fn replace_sources(&mut self, node_id: NodeId, sources: IndexSet<NodeId>) {
        let old = match self.get_node_mut(node_id) {
            Some(node) => node.take_sources(),
            None => return,
        };
        for source in old {
            if let Some(node) = self.get_node_mut(source) {
                node.remove_observer(node_id);
            }
        }
        for source in sources {
            if source != node_id {
                self.add_edge(source, node_id);
            }
        }
    }

    /// Push a change of `changed` downstream. Returns every affected vertex,
    /// sources before observers.
    pub fn mark_changed(&mut self, changed: NodeId) -> Vec<NodeId> {
        let mut affected = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<NodeId> = match self.get_node(changed) {
            Some(node) => node.observers().iter().copied().collect(),
            None => VecDeque::new(),
        };
        for &observer in &queue {
            if let Some(node) = self.get_node_mut(observer) {
                node.invalidate();
            }
        }

        while let Some(node_id) = queue.pop_front() {
            if !seen.insert(node_id) {
                continue;
            }
            let Some(node) = self.get_node_mut(node_id) else {
                continue;
            };
            node.suspect();
            affected.push(node_id);
            queue.extend(node.observers().iter().copied());
        }

        self.topological_sort(affected)
    }

    /// Kahn's algorithm restricted to `nodes`.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        for &node_id in &nodes {
            let Some(node) = self.get_node(node_id) else {
                continue;
            };
            let degree = node.sources().iter().filter(|source| node_set.contains(source)).count();
            in_degree.insert(node_id, degree);
            if degree == 0 {
                queue.push_back(node_id);
            }
        }

        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);
            let Some(node) = self.get_node(node_id) else {
                continue;
            };
            for observer in node.observers() {
                if let Some(degree) = in_degree.get_mut(observer) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(*observer);
                    }
                }
            }
        }

        result
    }

    /// Live vertices.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl<P> Default for UpdateScheduler<P> {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Tests ----
