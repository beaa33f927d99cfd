//! Hydration id assignment.
//!
//! Hids are handed out from a per-session counter that never goes backwards,
//! so an id is never reused for a different node within a session. Once
//! `u32::MAX` has been handed out the allocator is exhausted and every
//! further request fails.

use std::sync::Arc;

use super::{flatten, Element, Hid, Node};
use crate::error::DiffError;

/// Session-monotonic source of hydration ids.
#[derive(Debug, Clone)]
pub struct HidAllocator {
    /// `None` once the id space is used up.
    next: Option<u32>,
}

impl HidAllocator {
    /// Create an allocator whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub(crate) fn starting_at(first: u32) -> Self {
        Self {
            next: Some(first.max(1)),
        }
    }

    /// Draw a fresh hid.
    pub fn allocate(&mut self) -> Result<Hid, DiffError> {
        let value = self.next.ok_or(DiffError::HidsExhausted)?;
        self.next = value.checked_add(1);
        Ok(Hid::new(value))
    }

    /// The id the next call to [`HidAllocator::allocate`] will return, or
    /// `None` when the allocator is exhausted.
    pub fn peek(&self) -> Option<Hid> {
        self.next.map(Hid::new)
    }

    /// Commit a freshly rendered subtree: every element receives a new hid in
    /// depth-first preorder and fragments are flattened into their parents.
    ///
    /// A fragment at the root stays a fragment of committed children.
    pub fn assign(&mut self, node: &Node) -> Result<Node, DiffError> {
        match node {
            Node::Element(element) => {
                let (_, committed) = self.assign_element(element)?;
                Ok(committed)
            }
            Node::Text(_) => Ok(node.clone()),
            Node::Fragment(children) => Ok(Node::Fragment(
                flatten(children)
                    .into_iter()
                    .map(|child| self.assign(child))
                    .collect::<Result<Arc<[Node]>, _>>()?,
            )),
        }
    }

    /// Commit one element and its subtree, returning the element's new hid.
    pub fn assign_element(&mut self, element: &Element) -> Result<(Hid, Node), DiffError> {
        let hid = self.allocate()?;
        let children = flatten(element.children())
            .into_iter()
            .map(|child| self.assign(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((hid, Node::from(element.committed(hid, children))))
    }
}

impl Default for HidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_in_preorder() {
        let tree: Node = Element::new("div")
            .child(Element::new("span").child("a"))
            .child(Node::fragment([Element::new("b").into(), Node::text("t")]))
            .child(Element::new("i"))
            .into();

        let mut hids = HidAllocator::new();
        let committed = hids.assign(&tree).unwrap();

        let mut seen = Vec::new();
        committed.for_each_element(&mut |element| seen.push((element.tag().to_string(), element.hid())));
        assert_eq!(
            seen,
            vec![
                ("div".to_string(), Some(Hid::new(1))),
                ("span".to_string(), Some(Hid::new(2))),
                ("b".to_string(), Some(Hid::new(3))),
                ("i".to_string(), Some(Hid::new(4))),
            ]
        );
        assert_eq!(hids.peek(), Some(Hid::new(5)));

        // The fragment was flattened into div.
        let div = committed.as_element().unwrap();
        assert_eq!(div.children().len(), 4);
        assert_eq!(div.children()[2].as_text(), Some("t"));
    }

    #[test]
    fn ids_are_never_reused() {
        let tree: Node = Element::new("p").into();
        let mut hids = HidAllocator::new();
        let first = hids.assign(&tree).unwrap();
        let second = hids.assign(&tree).unwrap();
        assert_ne!(first.hid(), second.hid());
    }

    #[test]
    fn root_fragment_stays_fragment() {
        let tree = Node::fragment([Node::text("x"), Element::new("p").into()]);
        let committed = HidAllocator::new().assign(&tree).unwrap();
        match committed {
            Node::Fragment(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[1].hid(), Some(Hid::new(1)));
            }
            other => panic!("expected fragment, got {:?}", other),
        }
    }

    #[test]
    fn exhaustion_is_an_error_not_an_alias() {
        let mut hids = HidAllocator::starting_at(u32::MAX - 1);
        assert_eq!(hids.allocate(), Ok(Hid::new(u32::MAX - 1)));
        assert_eq!(hids.allocate(), Ok(Hid::new(u32::MAX)));
        assert_eq!(hids.peek(), None);
        assert_eq!(hids.allocate(), Err(DiffError::HidsExhausted));
        assert_eq!(hids.allocate(), Err(DiffError::HidsExhausted));
    }

    #[test]
    fn subtree_larger_than_the_remaining_space_fails() {
        let tree: Node = Element::new("ul")
            .child(Element::new("li"))
            .child(Element::new("li"))
            .into();
        let mut hids = HidAllocator::starting_at(u32::MAX - 1);
        assert_eq!(hids.assign(&tree), Err(DiffError::HidsExhausted));
    }
}
