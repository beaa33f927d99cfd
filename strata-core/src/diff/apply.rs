//! Reference patch applier.
//!
//! A hid-addressed mutable tree that patches are applied to in order. The
//! client keeps the real one; this one checks that a patch list actually
//! turns the previous snapshot into the next.

use indexmap::IndexMap;

use super::Patch;
use crate::error::ApplyError;
use crate::tree::{Hid, Node, EVENT_NAMESPACE};

/// A node of the live tree. Fragments do not exist here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveNode {
    Element(LiveElement),
    Text(String),
}

impl LiveNode {
    pub fn hid(&self) -> Option<Hid> {
        match self {
            LiveNode::Element(element) => element.hid,
            LiveNode::Text(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&LiveElement> {
        match self {
            LiveNode::Element(element) => Some(element),
            LiveNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            LiveNode::Text(text) => Some(text.as_str()),
            LiveNode::Element(_) => None,
        }
    }

    /// Build the live nodes a tree node expands to.
    pub fn build(node: &Node) -> Vec<LiveNode> {
        let mut out = Vec::new();
        build_into(node, &mut out);
        out
    }
}

fn build_into(node: &Node, out: &mut Vec<LiveNode>) {
    match node {
        Node::Element(element) => {
            let mut attributes = element.attributes().clone();
            for (event, handler) in element.events() {
                attributes.insert(format!("{}{}", EVENT_NAMESPACE, event), handler.to_string());
            }
            let mut children = Vec::with_capacity(element.children().len());
            for child in element.children() {
                build_into(child, &mut children);
            }
            out.push(LiveNode::Element(LiveElement {
                tag: element.tag().to_string(),
                hid: element.hid(),
                attributes,
                styles: element.styles().clone(),
                children,
            }));
        }
        Node::Text(text) => out.push(LiveNode::Text(text.to_string())),
        Node::Fragment(children) => {
            for child in children.iter() {
                build_into(child, out);
            }
        }
    }
}

/// An element of the live tree.
///
/// Event bindings are plain attributes in the `on:` namespace, as the client
/// sees them. Equality ignores attribute and style order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveElement {
    tag: String,
    hid: Option<Hid>,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    children: Vec<LiveNode>,
}

impl LiveElement {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn hid(&self) -> Option<Hid> {
        self.hid
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn styles(&self) -> &IndexMap<String, String> {
        &self.styles
    }

    pub fn children(&self) -> &[LiveNode] {
        &self.children
    }

    /// Concatenated text content of the subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[LiveNode], out: &mut String) {
    for node in nodes {
        match node {
            LiveNode::Text(text) => out.push_str(text),
            LiveNode::Element(element) => collect_text(&element.children, out),
        }
    }
}

/// The content of a mount container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTree {
    root: Vec<LiveNode>,
}

impl LiveTree {
    /// An empty mount container.
    pub fn new() -> Self {
        Self::default()
    }

    /// A live tree holding a committed snapshot.
    pub fn from_node(node: &Node) -> Self {
        Self {
            root: LiveNode::build(node),
        }
    }

    /// Children of the mount container.
    pub fn children(&self) -> &[LiveNode] {
        &self.root
    }

    /// Find an element by hid.
    pub fn find(&self, hid: Hid) -> Option<&LiveElement> {
        let path = self.path_to(hid)?;
        let mut siblings = &self.root;
        let mut found = None;
        for index in path {
            let element = siblings.get(index)?.as_element()?;
            siblings = &element.children;
            found = Some(element);
        }
        found
    }

    /// Apply patches in order, stopping at the first failure.
    pub fn apply_all<'a>(&mut self, patches: impl IntoIterator<Item = &'a Patch>) -> Result<(), ApplyError> {
        patches.into_iter().try_for_each(|patch| self.apply(patch))
    }

    /// Apply one patch. A failing patch may leave the tree partially
    /// modified.
    pub fn apply(&mut self, patch: &Patch) -> Result<(), ApplyError> {
        match patch {
            Patch::SetText { target, text } => {
                *self.children_mut(*target)? = vec![LiveNode::Text(text.clone())];
            }
            Patch::SetAttribute { target, name, value } => {
                self.element_mut(*target)?.attributes.insert(name.clone(), value.clone());
            }
            Patch::RemoveAttribute { target, name } => {
                self.element_mut(*target)?.attributes.shift_remove(name);
            }
            Patch::SetStyle { target, property, value } => {
                let styles = &mut self.element_mut(*target)?.styles;
                if value.is_empty() {
                    styles.shift_remove(property);
                } else {
                    styles.insert(property.clone(), value.clone());
                }
            }
            Patch::InsertBefore { parent, reference, node } => {
                let children = self.children_mut(*parent)?;
                let index = children
                    .iter()
                    .position(|child| child.hid() == Some(*reference))
                    .ok_or(ApplyError::UnknownTarget(*reference))?;
                children.splice(index..index, LiveNode::build(node));
            }
            Patch::AppendChild { parent, node } => {
                self.children_mut(*parent)?.extend(LiveNode::build(node));
            }
            Patch::RemoveNode { target } => {
                self.detach(*target)?;
            }
            Patch::ReplaceNode { target, node } if target.is_mount() => {
                self.root = LiveNode::build(node);
            }
            Patch::ReplaceNode { target, node } => {
                let (siblings, index) = self.locate(*target)?;
                siblings.splice(index..=index, LiveNode::build(node));
            }
            Patch::MoveNode { target, parent, index } => {
                let node = self.detach(*target)?;
                let children = self.children_mut(*parent)?;
                let at = *index as usize;
                if at > children.len() {
                    return Err(ApplyError::IndexOutOfBounds {
                        parent: *parent,
                        index: *index,
                    });
                }
                children.insert(at, node);
            }
        }
        Ok(())
    }

    fn path_to(&self, hid: Hid) -> Option<Vec<usize>> {
        fn search(nodes: &[LiveNode], hid: Hid, path: &mut Vec<usize>) -> bool {
            for (index, node) in nodes.iter().enumerate() {
                if let LiveNode::Element(element) = node {
                    path.push(index);
                    if element.hid == Some(hid) || search(&element.children, hid, path) {
                        return true;
                    }
                    path.pop();
                }
            }
            false
        }

        let mut path = Vec::new();
        search(&self.root, hid, &mut path).then_some(path)
    }

    /// The sibling list holding `hid` and its index in it.
    fn locate(&mut self, hid: Hid) -> Result<(&mut Vec<LiveNode>, usize), ApplyError> {
        let path = self.path_to(hid).ok_or(ApplyError::UnknownTarget(hid))?;
        let (last, parents) = path.split_last().ok_or(ApplyError::UnknownTarget(hid))?;

        let mut siblings = &mut self.root;
        for index in parents {
            siblings = match &mut siblings[*index] {
                LiveNode::Element(element) => &mut element.children,
                LiveNode::Text(_) => return Err(ApplyError::NotAnElement(hid)),
            };
        }
        Ok((siblings, *last))
    }

    fn element_mut(&mut self, hid: Hid) -> Result<&mut LiveElement, ApplyError> {
        let (siblings, index) = self.locate(hid)?;
        match &mut siblings[index] {
            LiveNode::Element(element) => Ok(element),
            LiveNode::Text(_) => Err(ApplyError::NotAnElement(hid)),
        }
    }

    fn children_mut(&mut self, parent: Hid) -> Result<&mut Vec<LiveNode>, ApplyError> {
        if parent.is_mount() {
            return Ok(&mut self.root);
        }
        Ok(&mut self.element_mut(parent)?.children)
    }

    fn detach(&mut self, hid: Hid) -> Result<LiveNode, ApplyError> {
        let (siblings, index) = self.locate(hid)?;
        Ok(siblings.remove(index))
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::tree::{Element, HandlerId, HidAllocator};

    fn sample() -> LiveTree {
        let mut hids = HidAllocator::new();
        let tree: Node = Element::new("ul")
            .with_children(["a", "b", "c"].map(|key| Element::new("li").with_key(key).child(key)))
            .into();
        LiveTree::from_node(&hids.assign(&tree).unwrap())
    }

    fn texts(tree: &LiveTree) -> Vec<String> {
        tree.find(Hid::new(1))
            .unwrap()
            .children()
            .iter()
            .map(|child| child.as_element().unwrap().text_content())
            .collect()
    }

    #[test]
    fn builds_from_committed_snapshot() {
        let mut hids = HidAllocator::new();
        let tree: Node = Element::new("button")
            .on("click", HandlerId::from_raw(4))
            .style("color", "red")
            .child(Node::fragment([Node::text("a"), Node::text("b")]))
            .into();
        let live = LiveTree::from_node(&hids.assign(&tree).unwrap());

        let button = live.find(Hid::new(1)).unwrap();
        assert_eq!(button.attributes()["on:click"], "4");
        assert_eq!(button.styles()["color"], "red");
        assert_eq!(button.children().len(), 2);
        assert_eq!(button.text_content(), "ab");
    }

    #[test]
    fn move_counts_index_after_detach() {
        let mut live = sample();
        live.apply(&Patch::MoveNode {
            target: Hid::new(4),
            parent: Hid::new(1),
            index: 0,
        })
        .unwrap();
        assert_eq!(texts(&live), vec!["c", "a", "b"]);

        live.apply(&Patch::MoveNode {
            target: Hid::new(4),
            parent: Hid::new(1),
            index: 2,
        })
        .unwrap();
        assert_eq!(texts(&live), vec!["a", "b", "c"]);
    }

    #[test]
    fn insert_remove_and_set_text() {
        let mut live = sample();
        let node: Node = Element::new("li").with_hid(Hid::new(9)).child("x").into();
        live.apply_all(&[
            Patch::RemoveNode { target: Hid::new(3) },
            Patch::InsertBefore {
                parent: Hid::new(1),
                reference: Hid::new(4),
                node,
            },
            Patch::SetText {
                target: Hid::new(2),
                text: "z".into(),
            },
        ])
        .unwrap();
        assert_eq!(texts(&live), vec!["z", "x", "c"]);
    }

    #[test]
    fn replace_mount_content() {
        let mut live = sample();
        live.apply(&Patch::ReplaceNode {
            target: Hid::MOUNT,
            node: Node::fragment([Node::text("t"), Element::new("p").with_hid(Hid::new(7)).into()]),
        })
        .unwrap();
        assert_eq!(live.children().len(), 2);
        assert_eq!(live.children()[0].as_text(), Some("t"));
        assert!(live.find(Hid::new(1)).is_none());
        assert!(live.find(Hid::new(7)).is_some());
    }

    #[test]
    fn errors_name_the_missing_node() {
        let mut live = sample();
        assert_eq!(
            live.apply(&Patch::RemoveNode { target: Hid::new(42) }),
            Err(ApplyError::UnknownTarget(Hid::new(42)))
        );
        assert_eq!(
            live.apply(&Patch::MoveNode {
                target: Hid::new(2),
                parent: Hid::new(1),
                index: 5
            }),
            Err(ApplyError::IndexOutOfBounds {
                parent: Hid::new(1),
                index: 5
            })
        );
    }

    #[test]
    fn diff_output_reaches_next_snapshot() {
        let mut hids = HidAllocator::new();
        let list = |keys: &[&str]| -> Node {
            Element::new("ul")
                .attr("class", keys.join("-"))
                .with_children(keys.iter().map(|key| Element::new("li").with_key(*key).child(*key)))
                .into()
        };

        let first = diff(None, &list(&["a", "b", "c", "d"]), &mut hids).unwrap();
        let mut live = LiveTree::new();
        live.apply_all(&first.patches).unwrap();
        assert_eq!(live, LiveTree::from_node(&first.committed));

        let second = diff(Some(&first.committed), &list(&["d", "x", "b", "a"]), &mut hids).unwrap();
        live.apply_all(&second.patches).unwrap();
        assert_eq!(live, LiveTree::from_node(&second.committed));
        assert_eq!(texts(&live), vec!["d", "x", "b", "a"]);
    }
}
