//! Scalar encodings used to build message payloads.
//!
//! Wire format: all fixed-width integers are big-endian.
//! Variable-width unsigned integers (`uvarint`) are unsigned LEB128: seven
//! value bits per byte, low group first, high bit set on every byte but the
//! last. Strings are a `uvarint` byte length followed by the raw bytes, no
//! terminator.

use crate::error::{ArchiveError, Result};
use bytes::BufMut;

/// Longest LEB128 encoding of a `u64`.
pub const MAX_UVARINT_LEN: usize = 10;

/// Append `value` as an unsigned LEB128 varint.
pub fn put_uvarint<B: BufMut>(buf: &mut B, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from the front of `data`, returning (value, bytes_consumed).
///
/// Returns `Ok(None)` when `data` ends before the final byte.
pub fn decode_uvarint(data: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_UVARINT_LEN - 1 && byte > 0x01 {
            return Err(ArchiveError::Malformed {
                what: "uvarint",
                reason: "value overflows 64 bits".to_string(),
            });
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    Ok(None)
}

/// Append a length-prefixed byte string.
pub fn put_bytes<B: BufMut>(buf: &mut B, bytes: &[u8]) {
    put_uvarint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

/// Bounded reader over one frame payload.
///
/// Every accessor fails with [`ArchiveError::Truncated`] instead of reading
/// past the end. Leftover bytes are not an error.
#[derive(Debug, Clone, Copy)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: u64, what: &'static str) -> Result<&'a [u8]> {
        let available = self.data.len() as u64;
        if n > available {
            return Err(ArchiveError::Truncated {
                what,
                needed: n,
                available,
            });
        }
        let (head, tail) = self.data.split_at(n as usize);
        self.data = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let bytes = self.take(N as u64, what)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn u32(&mut self, what: &'static str) -> Result<u32> {
        self.array(what).map(u32::from_be_bytes)
    }

    pub fn u64(&mut self, what: &'static str) -> Result<u64> {
        self.array(what).map(u64::from_be_bytes)
    }

    pub fn i64(&mut self, what: &'static str) -> Result<i64> {
        self.array(what).map(i64::from_be_bytes)
    }

    pub fn uvarint(&mut self, what: &'static str) -> Result<u64> {
        match decode_uvarint(self.data)? {
            Some((value, used)) => {
                self.data = &self.data[used..];
                Ok(value)
            }
            None => Err(ArchiveError::Truncated {
                what,
                needed: self.data.len() as u64 + 1,
                available: self.data.len() as u64,
            }),
        }
    }

    /// Length-prefixed byte string.
    pub fn bytes(&mut self, what: &'static str) -> Result<&'a [u8]> {
        let len = self.uvarint(what)?;
        self.take(len, what)
    }
}
