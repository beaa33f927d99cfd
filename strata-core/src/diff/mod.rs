//! Diff/Patch Engine
//!
//! Compares the last committed snapshot with a freshly rendered tree and
//! produces the ordered patch list that turns one into the other.
//!
//! # Algorithm
//!
//! Both trees hang off the mount container (hid 0). For each pair of nodes at
//! the same position:
//!
//! 1. Different tag: `ReplaceNode`. No attempt is made to diff across kinds.
//! 2. Same tag: attributes, event bindings and styles are compared key by
//!    key, then the children are diffed.
//! 3. Children made only of elements are reconciled: matched by key when
//!    present, else by position. Unmatched previous children are removed
//!    first, then the next list is walked left to right, moving matched
//!    children that are not on the longest increasing run of previous
//!    positions and inserting new ones. Matched pairs are then diffed
//!    recursively.
//! 4. A child list that is a single text node becomes `SetText` on the
//!    parent. Other lists mixing text and elements are diffed position by
//!    position when their layout, texts and keys line up, so keyed elements
//!    never change identity. Anything else replaces the parent. Keys are
//!    checked against the previous list either way.
//!
//! Patches are safe to apply in order against one live tree: removals come
//! before insertions, and a node's own attribute patches come before any
//! patch touching its children.
//!
//! # Hydration
//!
//! The diff also produces the committed next snapshot. Matched elements keep
//! their previous hid; new subtrees draw fresh hids in emission order.

mod apply;
mod keyed;
mod patch;

use std::collections::HashSet;
use std::slice;

use indexmap::IndexMap;
use tracing::{instrument, trace};

use crate::error::DiffError;
use crate::tree::{flatten, Element, Hid, HidAllocator, Node, EVENT_NAMESPACE};

pub use apply::{LiveElement, LiveNode, LiveTree};
pub use patch::Patch;

/// Result of a diff.
#[derive(Debug, Clone)]
pub struct Diff {
    /// Patches in application order.
    pub patches: Vec<Patch>,
    /// The next tree with hids assigned. Becomes the baseline for the next
    /// diff once the patches have been delivered.
    pub committed: Node,
}

/// Diff `prev` (a committed snapshot, or `None` for the first render)
/// against the freshly rendered `next`.
#[instrument(level = "trace", skip_all)]
pub fn diff(prev: Option<&Node>, next: &Node, hids: &mut HidAllocator) -> Result<Diff, DiffError> {
    let prev_children = match prev {
        Some(prev) => flatten(slice::from_ref(prev)),
        None => Vec::new(),
    };
    let next_children = flatten(slice::from_ref(next));
    check_keys(MOUNT_LABEL, &next_children)?;

    let mut differ = Differ {
        hids,
        patches: Vec::new(),
    };

    let children = match plan_children(MOUNT_LABEL, &prev_children, &next_children)? {
        Some(plan) => differ.diff_children((Hid::MOUNT, MOUNT_LABEL), plan, &prev_children, &next_children)?,
        None => {
            let children = differ.assign_all(&next_children)?;
            differ.patches.push(Patch::ReplaceNode {
                target: Hid::MOUNT,
                node: Node::fragment(children.iter().cloned()),
            });
            children
        }
    };

    let committed = match next {
        Node::Fragment(_) => Node::Fragment(children.into()),
        _ => children.into_iter().next().unwrap_or_else(|| next.clone()),
    };

    trace!(patches = differ.patches.len(), "diff complete");
    Ok(Diff {
        patches: differ.patches,
        committed,
    })
}

/// Name used for the mount container in error messages.
const MOUNT_LABEL: &str = "mount";

/// Reject sibling lists in `children` (and below) that reuse a key.
fn check_keys(parent: &str, children: &[&Node]) -> Result<(), DiffError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for child in children {
        let Some(element) = child.as_element() else {
            continue;
        };
        if let Some(key) = element.key() {
            if !seen.insert(key) {
                return Err(DiffError::DuplicateKey {
                    key: key.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        check_keys(element.tag(), &flatten(element.children()))?;
    }
    Ok(())
}

/// How a child list is brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildPlan {
    /// The next list is one text node; replace the children wholesale.
    SetText,
    /// Same length and layout; texts and keys at the same positions are
    /// equal.
    Positional,
    /// Both lists hold only elements.
    Reconcile,
}

/// Pick how `next` replaces `prev` under the element named `parent`.
/// `None` means the parent's content is rebuilt.
fn plan_children(parent: &str, prev: &[&Node], next: &[&Node]) -> Result<Option<ChildPlan>, DiffError> {
    let is_element = |node: &&Node| matches!(node, Node::Element(_));

    if prev.iter().all(is_element) && next.iter().all(is_element) {
        return Ok(Some(ChildPlan::Reconcile));
    }

    // A key may not come back as a different element, even beside text.
    match_children(parent, &elements(prev), &elements(next))?;

    if let [Node::Text(_)] = next {
        return Ok(Some(ChildPlan::SetText));
    }

    let same_layout = prev.len() == next.len()
        && prev.iter().zip(next).all(|pair| match pair {
            (Node::Element(a), Node::Element(b)) => a.key() == b.key(),
            (Node::Text(a), Node::Text(b)) => a == b,
            _ => false,
        });
    Ok(same_layout.then_some(ChildPlan::Positional))
}

struct Differ<'a> {
    hids: &'a mut HidAllocator,
    patches: Vec<Patch>,
}

impl Differ<'_> {
    fn assign_all(&mut self, nodes: &[&Node]) -> Result<Vec<Node>, DiffError> {
        nodes.iter().map(|node| self.hids.assign(node)).collect()
    }

    fn diff_children(
        &mut self,
        (parent, label): (Hid, &str),
        plan: ChildPlan,
        prev: &[&Node],
        next: &[&Node],
    ) -> Result<Vec<Node>, DiffError> {
        match plan {
            ChildPlan::SetText => {
                let unchanged = matches!((prev, next), ([Node::Text(a)], [Node::Text(b)]) if a == b);
                if !unchanged {
                    if let [Node::Text(text)] = next {
                        self.patches.push(Patch::SetText {
                            target: parent,
                            text: text.to_string(),
                        });
                    }
                }
                Ok(next.iter().map(|node| (*node).clone()).collect())
            }
            ChildPlan::Positional => prev
                .iter()
                .zip(next)
                .map(|pair| match pair {
                    (Node::Element(a), Node::Element(b)) => self.diff_matched(a, b),
                    (_, other) => Ok((*other).clone()),
                })
                .collect(),
            ChildPlan::Reconcile => self.reconcile((parent, label), &elements(prev), &elements(next)),
        }
    }

    /// Keyed reconciliation of two element-only child lists.
    fn reconcile(
        &mut self,
        (parent, label): (Hid, &str),
        prev: &[&Element],
        next: &[&Element],
    ) -> Result<Vec<Node>, DiffError> {
        let matches = match_children(label, prev, next)?;

        // Children already in relative order stay put.
        let sources: Vec<usize> = matches.iter().flatten().copied().collect();
        let stable = keyed::stable_set(&sources);
        let layout = keyed::layout(prev.len(), &matches, &stable);
        let mut live = keyed::LiveOrder::new(layout.len);

        // Removals first, in previous order.
        for (element, slot) in prev.iter().zip(&layout.prev) {
            let hid = hid_of(element)?;
            match *slot {
                Some(slot) => live.occupy(slot, hid),
                None => self.patches.push(Patch::RemoveNode { target: hid }),
            }
        }

        let mut slots = Vec::with_capacity(next.len());
        let mut rank = 0;
        for ((element, matched), &slot) in next.iter().zip(&matches).zip(&layout.next) {
            match *matched {
                Some(source) => {
                    if !stable[rank] {
                        let hid = hid_of(prev[source])?;
                        let from = layout.prev[source].map(|old| {
                            let from = live.index_of(old);
                            live.vacate(old);
                            from
                        });
                        let to = live.index_of(slot);
                        live.occupy(slot, hid);
                        if from != Some(to) {
                            self.patches.push(Patch::MoveNode {
                                target: hid,
                                parent,
                                index: to as u32,
                            });
                        }
                    }
                    rank += 1;
                    slots.push(Slot::Matched(source));
                }
                None => {
                    let (hid, node) = self.hids.assign_element(element)?;
                    let patch = match live.after(slot) {
                        Some(reference) => Patch::InsertBefore {
                            parent,
                            reference,
                            node: node.clone(),
                        },
                        None => Patch::AppendChild {
                            parent,
                            node: node.clone(),
                        },
                    };
                    self.patches.push(patch);
                    live.occupy(slot, hid);
                    slots.push(Slot::Fresh(node));
                }
            }
        }

        // Recurse into matched pairs once this level is in place.
        slots
            .into_iter()
            .zip(next)
            .map(|(slot, element)| match slot {
                Slot::Fresh(node) => Ok(node),
                Slot::Matched(source) => self.diff_matched(prev[source], element),
            })
            .collect()
    }

    /// Diff two elements occupying the same logical slot.
    fn diff_matched(&mut self, prev: &Element, next: &Element) -> Result<Node, DiffError> {
        let hid = hid_of(prev)?;

        if prev.tag() != next.tag() {
            let (_, node) = self.hids.assign_element(next)?;
            self.patches.push(Patch::ReplaceNode {
                target: hid,
                node: node.clone(),
            });
            return Ok(node);
        }

        let prev_children = flatten(prev.children());
        let next_children = flatten(next.children());
        let Some(plan) = plan_children(next.tag(), &prev_children, &next_children)? else {
            // The element survives but its content is rebuilt.
            let children = self.assign_all(&next_children)?;
            let node = Node::from(next.committed(hid, children));
            self.patches.push(Patch::ReplaceNode {
                target: hid,
                node: node.clone(),
            });
            return Ok(node);
        };

        self.diff_attributes(hid, prev, next);
        let children = self.diff_children((hid, next.tag()), plan, &prev_children, &next_children)?;
        Ok(Node::from(next.committed(hid, children)))
    }

    fn diff_attributes(&mut self, target: Hid, prev: &Element, next: &Element) {
        diff_map(prev.attributes(), next.attributes(), |name, value| match value {
            Some(value) => self.patches.push(Patch::SetAttribute {
                target,
                name: name.to_string(),
                value: value.to_string(),
            }),
            None => self.patches.push(Patch::RemoveAttribute {
                target,
                name: name.to_string(),
            }),
        });

        diff_map(prev.events(), next.events(), |event, handler| {
            let name = format!("{}{}", EVENT_NAMESPACE, event);
            match handler {
                Some(handler) => self.patches.push(Patch::SetAttribute {
                    target,
                    name,
                    value: handler.to_string(),
                }),
                None => self.patches.push(Patch::RemoveAttribute { target, name }),
            }
        });

        diff_map(prev.styles(), next.styles(), |property, value| {
            self.patches.push(Patch::SetStyle {
                target,
                property: property.to_string(),
                value: value.cloned().unwrap_or_default(),
            })
        });
    }
}

/// Call `emit(key, Some(new))` for added or changed entries, then
/// `emit(key, None)` for removed ones.
fn diff_map<V: PartialEq>(
    prev: &IndexMap<String, V>,
    next: &IndexMap<String, V>,
    mut emit: impl FnMut(&str, Option<&V>),
) {
    for (key, value) in next {
        if prev.get(key) != Some(value) {
            emit(key, Some(value));
        }
    }
    for key in prev.keys() {
        if !next.contains_key(key) {
            emit(key, None);
        }
    }
}

fn elements<'a>(nodes: &[&'a Node]) -> Vec<&'a Element> {
    nodes.iter().filter_map(|node| node.as_element()).collect()
}

fn hid_of(element: &Element) -> Result<Hid, DiffError> {
    element.hid().ok_or_else(|| DiffError::Uncommitted {
        tag: element.tag().to_string(),
    })
}

/// A next child after placement.
enum Slot {
    /// Inserted with fresh hids; already committed.
    Fresh(Node),
    /// Continues the previous child at this index.
    Matched(usize),
}

/// For each next child, the index of the previous child it continues.
///
/// Keyed children match the previous child with the same key. Unkeyed
/// children match the unkeyed previous child at the same index. Keys are
/// already known to be unique among `next`.
fn match_children(parent: &str, prev: &[&Element], next: &[&Element]) -> Result<Vec<Option<usize>>, DiffError> {
    let prev_keys: IndexMap<&str, usize> = prev
        .iter()
        .enumerate()
        .filter_map(|(index, element)| element.key().map(|key| (key, index)))
        .collect();

    next.iter()
        .enumerate()
        .map(|(index, element)| match element.key() {
            Some(key) => match prev_keys.get(key) {
                Some(&source) if prev[source].tag() != element.tag() => Err(DiffError::DuplicateKey {
                    key: key.to_string(),
                    parent: parent.to_string(),
                }),
                Some(&source) => Ok(Some(source)),
                None => Ok(None),
            },
            None => Ok(prev
                .get(index)
                .filter(|candidate| candidate.key().is_none())
                .map(|_| index)),
        })
        .collect()
}

/// Total number of patches that touch structure rather than attributes.
pub fn structural_patch_count(patches: &[Patch]) -> usize {
    patches
        .iter()
        .filter(|patch| {
            matches!(
                patch,
                Patch::InsertBefore { .. }
                    | Patch::AppendChild { .. }
                    | Patch::RemoveNode { .. }
                    | Patch::ReplaceNode { .. }
                    | Patch::MoveNode { .. }
            )
        })
        .count()
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::HandlerId;

    fn commit(node: &Node, hids: &mut HidAllocator) -> Node {
        diff(None, node, hids).unwrap().committed
    }

    fn keyed_list(keys: &[&str]) -> Node {
        Element::new("ul")
            .with_children(keys.iter().map(|key| Element::new("li").with_key(*key).child(*key)))
            .into()
    }

    fn moves(patches: &[Patch]) -> Vec<&Patch> {
        patches.iter().filter(|p| matches!(p, Patch::MoveNode { .. })).collect()
    }

    #[test]
    fn first_render_appends_to_mount() {
        let mut hids = HidAllocator::new();
        let tree: Node = Element::new("div").child("0").into();
        let result = diff(None, &tree, &mut hids).unwrap();

        assert_eq!(result.patches.len(), 1);
        match &result.patches[0] {
            Patch::AppendChild { parent, node } => {
                assert_eq!(*parent, Hid::MOUNT);
                assert_eq!(node.hid(), Some(Hid::new(1)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(result.committed.hid(), Some(Hid::new(1)));
    }

    #[test]
    fn diff_against_self_is_empty() {
        let mut hids = HidAllocator::new();
        let tree: Node = Element::new("div")
            .attr("id", "x")
            .style("color", "red")
            .on("click", HandlerId::from_raw(1))
            .child(keyed_list(&["a", "b"]))
            .child("text")
            .into();
        let committed = commit(&tree, &mut hids);

        let again = diff(Some(&committed), &committed, &mut hids).unwrap();
        assert!(again.patches.is_empty());
        assert_eq!(again.committed, committed);
    }

    #[test]
    fn text_change_targets_parent() {
        let mut hids = HidAllocator::new();
        let committed = commit(&Element::new("div").child("0").into(), &mut hids);

        let next: Node = Element::new("div").child("1").into();
        let result = diff(Some(&committed), &next, &mut hids).unwrap();
        assert_eq!(
            result.patches,
            vec![Patch::SetText {
                target: Hid::new(1),
                text: "1".into()
            }]
        );
    }

    #[test]
    fn attribute_changes() {
        let mut hids = HidAllocator::new();
        let committed = commit(
            &Element::new("a").attr("href", "/").attr("title", "t").style("color", "red").into(),
            &mut hids,
        );
        let next: Node = Element::new("a")
            .attr("href", "/home")
            .on("click", HandlerId::from_raw(9))
            .into();

        let result = diff(Some(&committed), &next, &mut hids).unwrap();
        let target = Hid::new(1);
        assert_eq!(
            result.patches,
            vec![
                Patch::SetAttribute { target, name: "href".into(), value: "/home".into() },
                Patch::RemoveAttribute { target, name: "title".into() },
                Patch::SetAttribute { target, name: "on:click".into(), value: "9".into() },
                Patch::SetStyle { target, property: "color".into(), value: String::new() },
            ]
        );
    }

    #[test]
    fn tag_change_replaces_node() {
        let mut hids = HidAllocator::new();
        let committed = commit(&Element::new("div").child(Element::new("span")).into(), &mut hids);
        let next: Node = Element::new("div").child(Element::new("b")).into();

        let result = diff(Some(&committed), &next, &mut hids).unwrap();
        assert_eq!(result.patches.len(), 1);
        assert!(matches!(result.patches[0], Patch::ReplaceNode { target, .. } if target == Hid::new(2)));
    }

    #[test]
    fn reversing_three_keyed_items_moves_twice() {
        let mut hids = HidAllocator::new();
        let committed = commit(&keyed_list(&["a", "b", "c"]), &mut hids);
        let result = diff(Some(&committed), &keyed_list(&["c", "b", "a"]), &mut hids).unwrap();

        assert_eq!(moves(&result.patches).len(), 2);
        assert_eq!(structural_patch_count(&result.patches), 2);
    }

    #[test]
    fn rotation_moves_one_item() {
        let mut hids = HidAllocator::new();
        let committed = commit(&keyed_list(&["a", "b", "c"]), &mut hids);
        let c = committed.as_element().unwrap().children()[2].hid().unwrap();
        let result = diff(Some(&committed), &keyed_list(&["c", "a", "b"]), &mut hids).unwrap();

        assert_eq!(
            result.patches,
            vec![Patch::MoveNode {
                target: c,
                parent: Hid::new(1),
                index: 0
            }]
        );
    }

    #[test]
    fn keyed_insert_and_remove() {
        let mut hids = HidAllocator::new();
        let committed = commit(&keyed_list(&["a", "b", "c"]), &mut hids);
        let children: Vec<Hid> = committed
            .as_element()
            .unwrap()
            .children()
            .iter()
            .map(|child| child.hid().unwrap())
            .collect();

        let result = diff(Some(&committed), &keyed_list(&["a", "x", "c"]), &mut hids).unwrap();
        assert_eq!(result.patches.len(), 2);
        assert_eq!(result.patches[0], Patch::RemoveNode { target: children[1] });
        match &result.patches[1] {
            Patch::InsertBefore { parent, reference, node } => {
                assert_eq!(*parent, Hid::new(1));
                assert_eq!(*reference, children[2]);
                assert_eq!(node.key(), Some("x"));
            }
            other => panic!("unexpected {:?}", other),
        }

        // Survivors keep their hids.
        let next_children = result.committed.as_element().unwrap().children().to_vec();
        assert_eq!(next_children[0].hid(), Some(children[0]));
        assert_eq!(next_children[2].hid(), Some(children[2]));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut hids = HidAllocator::new();
        let result = diff(None, &keyed_list(&["a", "a"]), &mut hids);
        assert_eq!(
            result.unwrap_err(),
            DiffError::DuplicateKey {
                key: "a".into(),
                parent: "ul".into()
            }
        );
    }

    #[test]
    fn key_reused_for_different_tag_is_rejected() {
        let mut hids = HidAllocator::new();
        let committed = commit(&keyed_list(&["a"]), &mut hids);
        let next: Node = Element::new("ul").child(Element::new("p").with_key("a")).into();
        assert!(matches!(
            diff(Some(&committed), &next, &mut hids),
            Err(DiffError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn uncommitted_baseline_is_rejected() {
        let mut hids = HidAllocator::new();
        let raw: Node = Element::new("div").into();
        assert!(matches!(
            diff(Some(&raw), &raw, &mut hids),
            Err(DiffError::Uncommitted { .. })
        ));
    }

    #[test]
    fn mixed_layout_change_replaces_parent_content() {
        let mut hids = HidAllocator::new();
        let committed = commit(&Element::new("p").child("a").child(Element::new("b")).into(), &mut hids);
        let next: Node = Element::new("p").child(Element::new("b")).child("a").into();

        let result = diff(Some(&committed), &next, &mut hids).unwrap();
        assert_eq!(result.patches.len(), 1);
        match &result.patches[0] {
            Patch::ReplaceNode { target, node } => {
                assert_eq!(*target, Hid::new(1));
                assert_eq!(node.hid(), Some(Hid::new(1)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    fn child_hids(node: &Node) -> Vec<Option<Hid>> {
        node.as_element().unwrap().children().iter().map(Node::hid).collect()
    }

    fn labelled(keys: &[&str]) -> Node {
        Element::new("div")
            .child("label")
            .with_children(keys.iter().map(|key| Element::new("li").with_key(*key).child(*key)))
            .into()
    }

    #[test]
    fn keyed_siblings_beside_text_never_trade_hids() {
        let mut hids = HidAllocator::new();
        let first = diff(None, &labelled(&["a", "b"]), &mut hids).unwrap();
        let old = child_hids(&first.committed);

        let result = diff(Some(&first.committed), &labelled(&["b", "a"]), &mut hids).unwrap();
        assert!(!result.patches.iter().any(|p| matches!(p, Patch::SetText { .. })));
        assert_eq!(result.patches.len(), 1);
        assert!(matches!(result.patches[0], Patch::ReplaceNode { target, .. } if target == Hid::new(1)));

        // Neither item inherits the hid the other one had.
        let new = child_hids(&result.committed);
        assert_ne!(new[1], old[2]);
        assert_ne!(new[2], old[1]);

        let mut live = LiveTree::new();
        live.apply_all(&first.patches).unwrap();
        live.apply_all(&result.patches).unwrap();
        assert_eq!(live, LiveTree::from_node(&result.committed));
    }

    #[test]
    fn aligned_keys_beside_text_diff_in_place() {
        let mut hids = HidAllocator::new();
        let committed = commit(&labelled(&["a", "b"]), &mut hids);
        let old = child_hids(&committed);

        let next: Node = Element::new("div")
            .child("label")
            .child(Element::new("li").with_key("a").child("a"))
            .child(Element::new("li").with_key("b").child("b!"))
            .into();
        let result = diff(Some(&committed), &next, &mut hids).unwrap();
        assert_eq!(
            result.patches,
            vec![Patch::SetText {
                target: old[2].unwrap(),
                text: "b!".into()
            }]
        );
        assert_eq!(child_hids(&result.committed), old);
    }

    #[test]
    fn key_reused_for_different_tag_beside_text_is_rejected() {
        let mut hids = HidAllocator::new();
        let committed = commit(&Element::new("div").child("x").child(Element::new("li").with_key("a")).into(), &mut hids);
        let next: Node = Element::new("div").child("x").child(Element::new("p").with_key("a")).into();
        assert_eq!(
            diff(Some(&committed), &next, &mut hids).unwrap_err(),
            DiffError::DuplicateKey {
                key: "a".into(),
                parent: "div".into()
            }
        );
    }

    #[test]
    fn long_rotation_moves_one_item() {
        let keys: Vec<String> = (0..1_000).map(|n| n.to_string()).collect();
        let list = |keys: &[String]| -> Node {
            Element::new("ul")
                .with_children(keys.iter().map(|key| Element::new("li").with_key(key.as_str())))
                .into()
        };
        let mut hids = HidAllocator::new();
        let first = diff(None, &list(&keys), &mut hids).unwrap();

        let mut rotated = keys.clone();
        rotated.rotate_left(1);
        let result = diff(Some(&first.committed), &list(&rotated), &mut hids).unwrap();
        assert_eq!(result.patches.len(), 1);
        assert!(matches!(result.patches[0], Patch::MoveNode { index: 999, .. }));

        let reversed: Vec<String> = keys.iter().rev().cloned().collect();
        let result = diff(Some(&first.committed), &list(&reversed), &mut hids).unwrap();
        assert_eq!(moves(&result.patches).len(), 999);

        let mut live = LiveTree::new();
        live.apply_all(&first.patches).unwrap();
        live.apply_all(&result.patches).unwrap();
        assert_eq!(live, LiveTree::from_node(&result.committed));
    }

    #[test]
    fn shuffled_list_with_inserts_and_removals_applies_cleanly() {
        let mut hids = HidAllocator::new();
        let first = diff(None, &keyed_list(&["a", "b", "c", "d", "e", "f"]), &mut hids).unwrap();
        let next = keyed_list(&["x", "e", "b", "y", "a", "f", "z"]);
        let result = diff(Some(&first.committed), &next, &mut hids).unwrap();

        let mut live = LiveTree::new();
        live.apply_all(&first.patches).unwrap();
        live.apply_all(&result.patches).unwrap();
        assert_eq!(live, LiveTree::from_node(&result.committed));
    }

    #[test]
    fn exhausted_hids_fail_the_diff() {
        let mut hids = HidAllocator::starting_at(u32::MAX);
        let tree: Node = Element::new("div").child(Element::new("span")).into();
        assert_eq!(diff(None, &tree, &mut hids).unwrap_err(), DiffError::HidsExhausted);
    }
}
