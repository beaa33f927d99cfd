//! Version negotiation.
//!
//! The client opens with the versions it speaks (`count` varint followed by
//! one byte per version); the server answers with the single byte of the
//! version both sides will use for the rest of the connection.

use std::fmt;

use super::reader::Reader;
use super::varint::encode_varint;
use crate::error::{CodecError, Violation};

/// A protocol version. Opcode and node-kind tables are fixed per version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion(u8);

impl ProtocolVersion {
    pub const V1: ProtocolVersion = ProtocolVersion(1);

    /// Versions this build can speak, newest last.
    pub const SUPPORTED: &'static [ProtocolVersion] = &[ProtocolVersion::V1];

    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        ProtocolVersion::V1
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// First message from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub versions: Vec<ProtocolVersion>,
}

impl ClientHello {
    /// A hello offering every version this build supports.
    pub fn current() -> Self {
        Self {
            versions: ProtocolVersion::SUPPORTED.to_vec(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.versions.len());
        encode_varint(self.versions.len() as u64, &mut out);
        out.extend(self.versions.iter().map(|version| version.as_byte()));
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let count = reader.count(1)?;
        let versions = reader
            .bytes(count)?
            .iter()
            .map(|byte| ProtocolVersion::from_byte(*byte))
            .collect();
        reader.finish()?;
        Ok(Self { versions })
    }
}

/// The server's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHello {
    pub version: ProtocolVersion,
}

impl ServerHello {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.version.as_byte()]
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let version = ProtocolVersion::from_byte(reader.u8()?);
        reader.finish()?;
        if !version.is_supported() {
            return Err(Violation::UnsupportedVersion(version.as_byte()).into());
        }
        Ok(Self { version })
    }
}

/// Pick the newest version offered by the client that this build supports.
pub fn negotiate(hello: &ClientHello) -> Result<ServerHello, CodecError> {
    hello
        .versions
        .iter()
        .copied()
        .filter(|version| version.is_supported())
        .max()
        .map(|version| ServerHello { version })
        .ok_or_else(|| Violation::NoCommonVersion.into())
}
