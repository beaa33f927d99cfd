//! Patch operations.

use std::fmt;

use crate::tree::{Hid, Node};

/// One atomic mutation of the live tree.
///
/// Parent-relative patches (`InsertBefore`, `AppendChild`) address the
/// parent; [`Hid::MOUNT`] stands for the mount container. Text children have
/// no hid of their own and are replaced through their parent with `SetText`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Replace all children of `target` with a single text node.
    SetText { target: Hid, text: String },
    SetAttribute { target: Hid, name: String, value: String },
    RemoveAttribute { target: Hid, name: String },
    /// Insert `node` into `parent` right before the child `reference`.
    InsertBefore { parent: Hid, reference: Hid, node: Node },
    AppendChild { parent: Hid, node: Node },
    RemoveNode { target: Hid },
    /// Replace `target` with `node`. Targeting the mount replaces its whole
    /// content.
    ReplaceNode { target: Hid, node: Node },
    /// Detach `target` and reinsert it into `parent` at `index`, counted
    /// after the detach.
    MoveNode { target: Hid, parent: Hid, index: u32 },
    /// Set a style property. An empty value removes the property.
    SetStyle { target: Hid, property: String, value: String },
}

impl Patch {
    /// The hid carried in the patch header on the wire.
    pub fn target(&self) -> Hid {
        match self {
            Patch::SetText { target, .. }
            | Patch::SetAttribute { target, .. }
            | Patch::RemoveAttribute { target, .. }
            | Patch::RemoveNode { target }
            | Patch::ReplaceNode { target, .. }
            | Patch::MoveNode { target, .. }
            | Patch::SetStyle { target, .. } => *target,
            Patch::InsertBefore { parent, .. } | Patch::AppendChild { parent, .. } => *parent,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Patch::SetText { .. } => "SetText",
            Patch::SetAttribute { .. } => "SetAttribute",
            Patch::RemoveAttribute { .. } => "RemoveAttribute",
            Patch::InsertBefore { .. } => "InsertBefore",
            Patch::AppendChild { .. } => "AppendChild",
            Patch::RemoveNode { .. } => "RemoveNode",
            Patch::ReplaceNode { .. } => "ReplaceNode",
            Patch::MoveNode { .. } => "MoveNode",
            Patch::SetStyle { .. } => "SetStyle",
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.target())
    }
}
