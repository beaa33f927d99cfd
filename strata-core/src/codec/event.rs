//! Client events.
//!
//! An inbound frame is a plain sequence of events, each
//! `{event_type: u8, hid: varint, payload}`:
//!
//! | Type | Payload |
//! |---|---|
//! | Click, Focus, Blur | none |
//! | Input, Change | varint length + UTF-8 value |
//! | KeyDown | varint key code + modifier byte |

use std::fmt;

use bitflags::bitflags;

use super::reader::Reader;
use super::varint::encode_varint;
use crate::error::{CodecError, Violation};
use crate::tree::Hid;

/// Kinds of client events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    Click = 1,
    Focus = 2,
    Blur = 3,
    Input = 4,
    Change = 5,
    KeyDown = 6,
}

impl EventType {
    /// Event name as used in element bindings (`on("click", ..)`).
    pub fn name(self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::Focus => "focus",
            EventType::Blur => "blur",
            EventType::Input => "input",
            EventType::Change => "change",
            EventType::KeyDown => "keydown",
        }
    }

    fn carries_value(self) -> bool {
        matches!(self, EventType::Input | EventType::Change)
    }
}

impl TryFrom<u8> for EventType {
    type Error = Violation;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            1 => EventType::Click,
            2 => EventType::Focus,
            3 => EventType::Blur,
            4 => EventType::Input,
            5 => EventType::Change,
            6 => EventType::KeyDown,
            other => return Err(Violation::UnknownEventType(other)),
        })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

/// Typed event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    None,
    Value(String),
    Key { code: u32, modifiers: Modifiers },
}

/// A decoded client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub kind: EventType,
    pub hid: Hid,
    pub payload: EventPayload,
}

impl ClientEvent {
    pub fn click(hid: Hid) -> Self {
        Self::simple(EventType::Click, hid)
    }

    /// A payload-less event (click, focus, blur).
    pub fn simple(kind: EventType, hid: Hid) -> Self {
        Self {
            kind,
            hid,
            payload: EventPayload::None,
        }
    }

    pub fn input(hid: Hid, value: impl Into<String>) -> Self {
        Self {
            kind: EventType::Input,
            hid,
            payload: EventPayload::Value(value.into()),
        }
    }

    pub fn change(hid: Hid, value: impl Into<String>) -> Self {
        Self {
            kind: EventType::Change,
            hid,
            payload: EventPayload::Value(value.into()),
        }
    }

    pub fn key_down(hid: Hid, code: u32, modifiers: Modifiers) -> Self {
        Self {
            kind: EventType::KeyDown,
            hid,
            payload: EventPayload::Key { code, modifiers },
        }
    }

    /// The value of an input or change event.
    pub fn value(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Value(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Key code and modifiers of a key event.
    pub fn key(&self) -> Option<(u32, Modifiers)> {
        match self.payload {
            EventPayload::Key { code, modifiers } => Some((code, modifiers)),
            _ => None,
        }
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.kind as u8);
        encode_varint(u64::from(self.hid.get()), out);
        match &self.payload {
            EventPayload::None => {}
            EventPayload::Value(value) => {
                encode_varint(value.len() as u64, out);
                out.extend_from_slice(value.as_bytes());
            }
            EventPayload::Key { code, modifiers } => {
                encode_varint(u64::from(*code), out);
                out.push(modifiers.bits());
            }
        }
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>, max_string_bytes: u64) -> Result<Self, CodecError> {
        let kind = EventType::try_from(reader.u8()?)?;
        let hid = Hid::new(reader.varint_u32()?);
        let payload = if kind.carries_value() {
            EventPayload::Value(reader.string(max_string_bytes)?)
        } else if kind == EventType::KeyDown {
            let code = reader.varint_u32()?;
            let bits = reader.u8()?;
            let modifiers = Modifiers::from_bits(bits).ok_or(Violation::InvalidModifiers(bits))?;
            EventPayload::Key { code, modifiers }
        } else {
            EventPayload::None
        };
        Ok(Self { kind, hid, payload })
    }
}
