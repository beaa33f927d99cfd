//! Bounds-checked cursor over an inbound frame.

use super::varint::decode_varint;
use crate::error::{CodecError, Violation};

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn u8(&mut self) -> Result<u8, Violation> {
        let byte = *self.bytes.get(self.position).ok_or(Violation::Truncated)?;
        self.position += 1;
        Ok(byte)
    }

    pub(crate) fn varint(&mut self) -> Result<u64, Violation> {
        let (value, consumed) = decode_varint(&self.bytes[self.position..])?;
        self.position += consumed;
        Ok(value)
    }

    pub(crate) fn varint_u32(&mut self) -> Result<u32, Violation> {
        let value = self.varint()?;
        u32::try_from(value).map_err(|_| Violation::VarintOverflow { bits: 32 })
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], Violation> {
        if len > self.remaining() {
            return Err(Violation::Truncated);
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// A length-prefixed UTF-8 string of at most `limit` bytes.
    pub(crate) fn string(&mut self, limit: u64) -> Result<String, CodecError> {
        let len = self.varint()?;
        if len > limit {
            return Err(CodecError::AllocationLimitExceeded {
                what: "string",
                len,
                limit,
            });
        }
        let bytes = self.bytes(len as usize)?;
        let text = std::str::from_utf8(bytes).map_err(|_| Violation::InvalidUtf8)?;
        Ok(text.to_owned())
    }

    /// An element count. Every element takes at least `min_size` bytes, so
    /// counts the rest of the frame cannot hold are rejected before anything
    /// is allocated.
    pub(crate) fn count(&mut self, min_size: usize) -> Result<usize, Violation> {
        let count = self.varint()?;
        let fits = (self.remaining() / min_size.max(1)) as u64;
        if count > fits {
            return Err(Violation::Truncated);
        }
        Ok(count as usize)
    }

    /// Fail if anything is left over.
    pub(crate) fn finish(self) -> Result<(), Violation> {
        match self.remaining() {
            0 => Ok(()),
            trailing => Err(Violation::TrailingBytes(trailing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_sequence() {
        let mut reader = Reader::new(&[0x07, 0xac, 0x02, 0x02, b'h', b'i']);
        assert_eq!(reader.u8(), Ok(7));
        assert_eq!(reader.varint(), Ok(300));
        assert_eq!(reader.string(16).unwrap(), "hi");
        assert!(reader.is_empty());
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn string_limits_and_encoding() {
        let mut reader = Reader::new(&[0x05, b'h', b'e', b'l', b'l', b'o']);
        assert!(matches!(
            reader.string(4),
            Err(CodecError::AllocationLimitExceeded { len: 5, limit: 4, .. })
        ));

        let mut reader = Reader::new(&[0x02, 0xc3, 0x28]);
        assert_eq!(reader.string(16), Err(CodecError::ProtocolViolation(Violation::InvalidUtf8)));

        let mut reader = Reader::new(&[0x09, b'x']);
        assert_eq!(reader.string(16), Err(CodecError::ProtocolViolation(Violation::Truncated)));
    }

    #[test]
    fn counts_are_checked_against_remaining_bytes() {
        let mut reader = Reader::new(&[0x03, 0x00, 0x00]);
        assert_eq!(reader.count(1), Err(Violation::Truncated));

        let mut reader = Reader::new(&[0x02, 0x00, 0x00]);
        assert_eq!(reader.count(1), Ok(2));
    }

    #[test]
    fn u32_overflow_and_trailing_bytes() {
        let mut reader = Reader::new(&[0x80, 0x80, 0x80, 0x80, 0x10, 0x01]);
        assert_eq!(reader.varint_u32(), Err(Violation::VarintOverflow { bits: 32 }));
        assert_eq!(reader.finish(), Err(Violation::TrailingBytes(1)));
    }
}
