//! Binary Codec
//!
//! Dense wire format for patch streams (server to client) and input events
//! (client to server). All integers are unsigned LEB128 varints; every string
//! is a varint byte length followed by UTF-8.
//!
//! # Patch Frame
//!
//! ```text
//! frame   := count:varint patch*
//! patch   := opcode:u8 target:varint payload
//! ```
//!
//! | Opcode | Value | Payload |
//! |---|---|---|
//! | SetText | 1 | text |
//! | SetAttribute | 2 | name, value |
//! | RemoveAttribute | 3 | name |
//! | InsertBefore | 4 | reference hid, node |
//! | AppendChild | 5 | node |
//! | RemoveNode | 6 | |
//! | ReplaceNode | 7 | node |
//! | MoveNode | 8 | parent hid, index |
//! | SetStyle | 9 | property, value |
//!
//! For `InsertBefore` and `AppendChild` the target is the parent.
//!
//! # Encoded Nodes
//!
//! ```text
//! node    := 1 tag hid:varint attrs:varint (name value)* children:varint node*
//!          | 2 text
//!          | 3 children:varint node*
//! ```
//!
//! Hid 0 means "none". Event bindings travel as `on:<event>` attributes
//! whose value is the handler id in decimal, styles as `style:<property>`
//! attributes. Reconciliation keys are server-only and never encoded.
//!
//! # Limits
//!
//! Decoding never trusts a length: counts larger than the rest of the frame
//! are rejected as truncated before anything is allocated, and the ceilings
//! in [`CodecLimits`] bound strings, nodes, nesting, patch counts and frame
//! size.

mod event;
mod handshake;
mod reader;
mod varint;

use tracing::{instrument, trace};

use crate::config::CodecLimits;
use crate::diff::Patch;
use crate::error::{CodecError, Violation};
use crate::tree::{Element, HandlerId, Hid, Node, EVENT_NAMESPACE, STYLE_NAMESPACE};

use reader::Reader;

pub use event::{ClientEvent, EventPayload, EventType, Modifiers};
pub use handshake::{negotiate, ClientHello, ProtocolVersion, ServerHello};
pub use varint::{decode_varint, encode_varint, encoded_len, MAX_VARINT_LEN};

/// Patch opcodes of protocol version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    SetText = 1,
    SetAttribute = 2,
    RemoveAttribute = 3,
    InsertBefore = 4,
    AppendChild = 5,
    RemoveNode = 6,
    ReplaceNode = 7,
    MoveNode = 8,
    SetStyle = 9,
}

impl Opcode {
    pub fn of(patch: &Patch) -> Self {
        match patch {
            Patch::SetText { .. } => Opcode::SetText,
            Patch::SetAttribute { .. } => Opcode::SetAttribute,
            Patch::RemoveAttribute { .. } => Opcode::RemoveAttribute,
            Patch::InsertBefore { .. } => Opcode::InsertBefore,
            Patch::AppendChild { .. } => Opcode::AppendChild,
            Patch::RemoveNode { .. } => Opcode::RemoveNode,
            Patch::ReplaceNode { .. } => Opcode::ReplaceNode,
            Patch::MoveNode { .. } => Opcode::MoveNode,
            Patch::SetStyle { .. } => Opcode::SetStyle,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Violation;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            1 => Opcode::SetText,
            2 => Opcode::SetAttribute,
            3 => Opcode::RemoveAttribute,
            4 => Opcode::InsertBefore,
            5 => Opcode::AppendChild,
            6 => Opcode::RemoveNode,
            7 => Opcode::ReplaceNode,
            8 => Opcode::MoveNode,
            9 => Opcode::SetStyle,
            other => return Err(Violation::UnknownOpcode(other)),
        })
    }
}

const KIND_ELEMENT: u8 = 1;
const KIND_TEXT: u8 = 2;
const KIND_FRAGMENT: u8 = 3;

/// Encoder/decoder bound to one negotiated protocol version.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    version: ProtocolVersion,
    limits: CodecLimits,
}

impl Codec {
    /// A version 1 codec with the given limits.
    pub fn new(limits: CodecLimits) -> Self {
        Self {
            version: ProtocolVersion::V1,
            limits,
        }
    }

    /// A codec for a negotiated version.
    pub fn with_version(version: ProtocolVersion, limits: CodecLimits) -> Result<Self, CodecError> {
        if !version.is_supported() {
            return Err(Violation::UnsupportedVersion(version.as_byte()).into());
        }
        Ok(Self { version, limits })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn limits(&self) -> &CodecLimits {
        &self.limits
    }

    /// Encode a patch frame.
    pub fn encode_patches(&self, patches: &[Patch]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + patches.len() * 8);
        encode_varint(patches.len() as u64, &mut out);
        for patch in patches {
            encode_patch(patch, &mut out);
        }
        out
    }

    /// Decode a patch frame.
    #[instrument(level = "trace", skip_all, fields(len = bytes.len()))]
    pub fn decode_patches(&self, bytes: &[u8]) -> Result<Vec<Patch>, CodecError> {
        self.check_frame(bytes)?;
        let mut reader = Reader::new(bytes);

        let count = reader.varint()?;
        if count > self.limits.max_patches {
            return Err(Violation::LengthExceeded {
                what: "patch count",
                len: count,
                limit: self.limits.max_patches,
            }
            .into());
        }
        // Opcode and target take at least two bytes.
        if count > (reader.remaining() / 2) as u64 {
            return Err(Violation::Truncated.into());
        }

        let mut patches = Vec::with_capacity(count as usize);
        for _ in 0..count {
            patches.push(self.decode_patch(&mut reader)?);
        }
        reader.finish()?;
        trace!(patches = patches.len(), "decoded patch frame");
        Ok(patches)
    }

    /// Encode a sequence of client events as one frame.
    pub fn encode_events(&self, events: &[ClientEvent]) -> Vec<u8> {
        let mut out = Vec::new();
        for event in events {
            event.encode_into(&mut out);
        }
        out
    }

    /// Decode an inbound event frame.
    #[instrument(level = "trace", skip_all, fields(len = bytes.len()))]
    pub fn decode_events(&self, bytes: &[u8]) -> Result<Vec<ClientEvent>, CodecError> {
        self.check_frame(bytes)?;
        let mut reader = Reader::new(bytes);
        let mut events = Vec::new();
        while !reader.is_empty() {
            events.push(ClientEvent::decode_from(&mut reader, self.limits.max_string_bytes)?);
        }
        Ok(events)
    }

    /// Encode one node in the node grammar.
    pub fn encode_node(&self, node: &Node) -> Vec<u8> {
        let mut out = Vec::new();
        encode_node(node, &mut out);
        out
    }

    /// Decode a standalone node payload.
    pub fn decode_node(&self, bytes: &[u8]) -> Result<Node, CodecError> {
        self.check_frame(bytes)?;
        let mut reader = Reader::new(bytes);
        let node = NodeDecoder::new(&mut reader, &self.limits).decode()?;
        reader.finish()?;
        Ok(node)
    }

    fn check_frame(&self, bytes: &[u8]) -> Result<(), Violation> {
        let len = bytes.len() as u64;
        if len > self.limits.max_frame_bytes {
            return Err(Violation::LengthExceeded {
                what: "frame",
                len,
                limit: self.limits.max_frame_bytes,
            });
        }
        Ok(())
    }

    fn decode_patch(&self, reader: &mut Reader<'_>) -> Result<Patch, CodecError> {
        let opcode = Opcode::try_from(reader.u8()?)?;
        let target = Hid::new(reader.varint_u32()?);
        let max = self.limits.max_string_bytes;

        Ok(match opcode {
            Opcode::SetText => Patch::SetText {
                target,
                text: reader.string(max)?,
            },
            Opcode::SetAttribute => Patch::SetAttribute {
                target,
                name: reader.string(max)?,
                value: reader.string(max)?,
            },
            Opcode::RemoveAttribute => Patch::RemoveAttribute {
                target,
                name: reader.string(max)?,
            },
            Opcode::InsertBefore => {
                let reference = Hid::new(reader.varint_u32()?);
                let node = NodeDecoder::new(reader, &self.limits).decode()?;
                Patch::InsertBefore {
                    parent: target,
                    reference,
                    node,
                }
            }
            Opcode::AppendChild => Patch::AppendChild {
                parent: target,
                node: NodeDecoder::new(reader, &self.limits).decode()?,
            },
            Opcode::RemoveNode => Patch::RemoveNode { target },
            Opcode::ReplaceNode => Patch::ReplaceNode {
                target,
                node: NodeDecoder::new(reader, &self.limits).decode()?,
            },
            Opcode::MoveNode => Patch::MoveNode {
                target,
                parent: Hid::new(reader.varint_u32()?),
                index: reader.varint_u32()?,
            },
            Opcode::SetStyle => Patch::SetStyle {
                target,
                property: reader.string(max)?,
                value: reader.string(max)?,
            },
        })
    }
}

fn encode_str(text: &str, out: &mut Vec<u8>) {
    encode_varint(text.len() as u64, out);
    out.extend_from_slice(text.as_bytes());
}

fn encode_hid(hid: Hid, out: &mut Vec<u8>) {
    encode_varint(u64::from(hid.get()), out);
}

fn encode_patch(patch: &Patch, out: &mut Vec<u8>) {
    out.push(Opcode::of(patch) as u8);
    encode_hid(patch.target(), out);
    match patch {
        Patch::SetText { text, .. } => encode_str(text, out),
        Patch::SetAttribute { name, value, .. } => {
            encode_str(name, out);
            encode_str(value, out);
        }
        Patch::RemoveAttribute { name, .. } => encode_str(name, out),
        Patch::InsertBefore { reference, node, .. } => {
            encode_hid(*reference, out);
            encode_node(node, out);
        }
        Patch::AppendChild { node, .. } | Patch::ReplaceNode { node, .. } => encode_node(node, out),
        Patch::RemoveNode { .. } => {}
        Patch::MoveNode { parent, index, .. } => {
            encode_hid(*parent, out);
            encode_varint(u64::from(*index), out);
        }
        Patch::SetStyle { property, value, .. } => {
            encode_str(property, out);
            encode_str(value, out);
        }
    }
}

fn encode_node(node: &Node, out: &mut Vec<u8>) {
    match node {
        Node::Element(element) => {
            out.push(KIND_ELEMENT);
            encode_str(element.tag(), out);
            encode_hid(element.hid().unwrap_or(Hid::MOUNT), out);

            let count = element.attributes().len() + element.events().len() + element.styles().len();
            encode_varint(count as u64, out);
            for (name, value) in element.attributes() {
                encode_str(name, out);
                encode_str(value, out);
            }
            for (event, handler) in element.events() {
                encode_str(&format!("{}{}", EVENT_NAMESPACE, event), out);
                encode_str(&handler.to_string(), out);
            }
            for (property, value) in element.styles() {
                encode_str(&format!("{}{}", STYLE_NAMESPACE, property), out);
                encode_str(value, out);
            }

            encode_varint(element.children().len() as u64, out);
            for child in element.children() {
                encode_node(child, out);
            }
        }
        Node::Text(text) => {
            out.push(KIND_TEXT);
            encode_str(text, out);
        }
        Node::Fragment(children) => {
            out.push(KIND_FRAGMENT);
            encode_varint(children.len() as u64, out);
            for child in children.iter() {
                encode_node(child, out);
            }
        }
    }
}

/// Decodes one node payload, counting nodes and nesting against the limits.
struct NodeDecoder<'r, 'a> {
    reader: &'r mut Reader<'a>,
    limits: &'r CodecLimits,
    nodes: u64,
}

impl<'r, 'a> NodeDecoder<'r, 'a> {
    fn new(reader: &'r mut Reader<'a>, limits: &'r CodecLimits) -> Self {
        Self {
            reader,
            limits,
            nodes: 0,
        }
    }

    fn decode(mut self) -> Result<Node, CodecError> {
        self.node(1)
    }

    fn node(&mut self, depth: u32) -> Result<Node, CodecError> {
        if depth > self.limits.max_depth {
            return Err(CodecError::AllocationLimitExceeded {
                what: "nesting depth",
                len: u64::from(depth),
                limit: u64::from(self.limits.max_depth),
            });
        }
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(CodecError::AllocationLimitExceeded {
                what: "node count",
                len: self.nodes,
                limit: self.limits.max_nodes,
            });
        }

        let max = self.limits.max_string_bytes;
        match self.reader.u8()? {
            KIND_ELEMENT => {
                let mut element = Element::new(self.reader.string(max)?);
                let hid = Hid::new(self.reader.varint_u32()?);
                if !hid.is_mount() {
                    element = element.with_hid(hid);
                }

                // Each pair needs at least its two length bytes.
                let attributes = self.reader.count(2)?;
                for _ in 0..attributes {
                    let name = self.reader.string(max)?;
                    let value = self.reader.string(max)?;
                    element = if let Some(event) = name.strip_prefix(EVENT_NAMESPACE) {
                        let raw = value.parse::<u64>().map_err(|_| Violation::InvalidHandlerId(value.clone()))?;
                        element.on(event, HandlerId::from_raw(raw))
                    } else if let Some(property) = name.strip_prefix(STYLE_NAMESPACE) {
                        element.style(property, value)
                    } else {
                        element.attr(name, value)
                    };
                }

                let children = self.children(depth)?;
                Ok(element.with_children(children).into())
            }
            KIND_TEXT => Ok(Node::text(self.reader.string(max)?)),
            KIND_FRAGMENT => Ok(Node::fragment(self.children(depth)?)),
            other => Err(Violation::UnknownNodeKind(other).into()),
        }
    }

    fn children(&mut self, depth: u32) -> Result<Vec<Node>, CodecError> {
        let count = self.reader.count(1)?;
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            children.push(self.node(depth + 1)?);
        }
        Ok(children)
    }
}
