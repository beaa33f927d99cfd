//! Unsigned LEB128 varints.
//!
//! Seven data bits per byte, least significant group first; the high bit
//! marks a continuation. A `u64` needs at most ten bytes.

use crate::error::Violation;

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the varint encoding of `value` to `out`.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Number of bytes [`encode_varint`] writes for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint from the start of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize), Violation> {
    let mut value: u64 = 0;
    for (index, &byte) in bytes.iter().enumerate().take(MAX_VARINT_LEN) {
        let shift = 7 * index as u32;
        let data = u64::from(byte & 0x7f);
        // The tenth byte may only carry the top bit of a u64.
        if index == MAX_VARINT_LEN - 1 && data > 1 {
            return Err(Violation::VarintOverflow { bits: 64 });
        }
        value |= data << shift;
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(Violation::VarintOverflow { bits: 64 })
    } else {
        Err(Violation::Truncated)
    }
}
