//! Tree Model
//!
//! An immutable UI tree. Render functions build a fresh tree on every pass;
//! subtrees are reference-counted so a snapshot can be kept as the "previous"
//! baseline while the next one is built, and cloning a snapshot never copies
//! node contents.
//!
//! # Node Kinds
//!
//! - [`Element`]: a tag with attributes, styles, event bindings, an optional
//!   reconciliation key and ordered children.
//! - `Text`: a string leaf.
//! - `Fragment`: an ordered list of children without a wrapper. Fragments
//!   are flattened into their parent when a snapshot is committed.
//!
//! # Hydration IDs
//!
//! Committed snapshots carry a [`Hid`] on every element. Hids are the only
//! way patches address the live tree. [`Hid::MOUNT`] (0) is reserved: it
//! names the mount container in patches and means "no hid" on the wire.

mod hydration;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub use hydration::HidAllocator;

/// Attribute namespace used for event bindings on the wire and in patches.
pub const EVENT_NAMESPACE: &str = "on:";

/// Attribute namespace used for styles in the encoded-node grammar.
pub const STYLE_NAMESPACE: &str = "style:";

/// Hydration id: a stable identifier for an addressable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hid(u32);

impl Hid {
    /// The mount container. Also encodes "no hid" in the node grammar.
    pub const MOUNT: Hid = Hid(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Whether this is the reserved value 0.
    pub const fn is_mount(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Hid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hid#{}", self.0)
    }
}

/// Opaque identifier of an event handler registered with a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node of the UI tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Arc<Element>),
    Text(Arc<str>),
    Fragment(Arc<[Node]>),
}

impl Node {
    /// Create a text node.
    pub fn text(content: impl Into<Arc<str>>) -> Self {
        Node::Text(content.into())
    }

    /// Create a fragment.
    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(children.into_iter().collect())
    }

    /// Get the element, if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(&**element),
            _ => None,
        }
    }

    /// Get the text content, if this node is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(&**text),
            _ => None,
        }
    }

    /// The node's hid. Only committed elements have one.
    pub fn hid(&self) -> Option<Hid> {
        self.as_element().and_then(Element::hid)
    }

    /// The node's reconciliation key.
    pub fn key(&self) -> Option<&str> {
        self.as_element().and_then(Element::key)
    }

    /// Total number of nodes in this subtree, including fragments.
    pub fn node_count(&self) -> usize {
        match self {
            Node::Element(element) => 1 + element.children.iter().map(Node::node_count).sum::<usize>(),
            Node::Text(_) => 1,
            Node::Fragment(children) => 1 + children.iter().map(Node::node_count).sum::<usize>(),
        }
    }

    /// Call `f` for every element in depth-first preorder.
    pub fn for_each_element<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        match self {
            Node::Element(element) => {
                f(&**element);
                for child in &element.children {
                    child.for_each_element(f);
                }
            }
            Node::Text(_) => {}
            Node::Fragment(children) => {
                for child in children.iter() {
                    child.for_each_element(f);
                }
            }
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(Arc::new(element))
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::text(text)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::text(text)
    }
}

/// Expand fragments in a child list, yielding the children a live parent
/// would actually hold.
pub fn flatten(children: &[Node]) -> Vec<&Node> {
    let mut out = Vec::with_capacity(children.len());
    flatten_into(children, &mut out);
    out
}

fn flatten_into<'a>(children: &'a [Node], out: &mut Vec<&'a Node>) {
    for child in children {
        match child {
            Node::Fragment(inner) => flatten_into(inner, out),
            other => out.push(other),
        }
    }
}

/// An element node.
///
/// # Example
///
/// ```rust,ignore
/// let view: Node = Element::new("ul")
///     .attr("class", "todo")
///     .with_children(items.iter().map(|item| {
///         Element::new("li").with_key(item.id.to_string()).child(item.title.as_str()).into()
///     }))
///     .into();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    key: Option<String>,
    hid: Option<Hid>,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    events: IndexMap<String, HandlerId>,
    children: Vec<Node>,
}

impl Element {
    /// Create an element with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            key: None,
            hid: None,
            attributes: IndexMap::new(),
            styles: IndexMap::new(),
            events: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set a style property.
    pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), value.into());
        self
    }

    /// Bind an event to a handler.
    pub fn on(mut self, event: impl Into<String>, handler: HandlerId) -> Self {
        self.events.insert(event.into(), handler);
        self
    }

    /// Set the reconciliation key used to match this element among its
    /// siblings across renders.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children.
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Attach a hid. Used when rebuilding committed trees.
    pub fn with_hid(mut self, hid: Hid) -> Self {
        self.hid = Some(hid);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn hid(&self) -> Option<Hid> {
        self.hid
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn styles(&self) -> &IndexMap<String, String> {
        &self.styles
    }

    pub fn events(&self) -> &IndexMap<String, HandlerId> {
        &self.events
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// A copy of this element with `hid` and the given (already committed)
    /// children.
    pub(crate) fn committed(&self, hid: Hid, children: Vec<Node>) -> Element {
        Element {
            tag: self.tag.clone(),
            key: self.key.clone(),
            hid: Some(hid),
            attributes: self.attributes.clone(),
            styles: self.styles.clone(),
            events: self.events.clone(),
            children,
        }
    }
}
