//! LEB128 (little-endian base 128) variable-length integers.
//!
//! Signed values are written as their 64-bit two's complement, so negative
//! numbers always take ten bytes. Decoding is panic-free.

use bytes::{Buf, BufMut};
use portex_core::{Error, Result};

/// Maximum encoded size of a u64.
pub const MAX_LEN: usize = 10;

pub fn encode(value: u64, buf: &mut impl BufMut) {
    let mut current = value;
    loop {
        let byte = (current & 0x7F) as u8;
        current >>= 7;
        if current == 0 {
            buf.put_u8(byte);
            break;
        }
        buf.put_u8(byte | 0x80);
    }
}

pub fn decode(buf: &mut impl Buf) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;

    loop {
        if !buf.has_remaining() {
            return Err(Error::malformed("varint: unexpected end of buffer"));
        }
        let byte = buf.get_u8();

        // The tenth byte may only carry the top bit of a u64.
        if shift == 63 && byte > 1 {
            return Err(Error::malformed("varint: integer overflow"));
        }

        result |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn encode_i64(value: i64, buf: &mut impl BufMut) {
    encode(value as u64, buf)
}

pub fn decode_i64(buf: &mut impl Buf) -> Result<i64> {
    decode(buf).map(|v| v as i64)
}

/// Number of bytes `encode` writes for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}
