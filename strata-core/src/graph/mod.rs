//! Dependency Graph
//!
//! Topology of one session's reactive values. Vertices are signals, memos,
//! effects and render observers; an edge `a -> b` records that the last run
//! of `b` read `a`. Values and computations live next to each vertex as an
//! opaque payload owned by [`crate::reactive::Runtime`].
//!
//! # Layout
//!
//! - Vertices are stored in a generational [`Arena`]. Lookups are O(1) and
//!   the id of a disposed vertex fails to resolve instead of aliasing
//!   whatever reuses its slot.
//! - Every vertex keeps both edge directions, so invalidation walks
//!   observers and recomputation walks sources without a reverse index.
//! - Memo edges must stay acyclic. The runtime rejects a cycle at the
//!   read that would close it; the graph itself never stores one.

mod arena;
mod node;
mod scheduler;

pub use arena::{Arena, Index};
pub use node::{DirtyState, Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
