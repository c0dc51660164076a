//! Message types carried in archive frames.
//!
//! One struct per entry kind. `encode_into` appends the payload (no frame
//! header) to a reusable buffer; `decode` consumes it from a
//! [`PayloadReader`]. Field order is the wire order.

use crate::archive::platform::{bytes_to_os, os_to_bytes};
use crate::archive::scalar::{put_bytes, put_uvarint, PayloadReader};
use crate::error::Result;
use bytes::{BufMut, BytesMut};
use std::ffi::OsString;
use std::path::PathBuf;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    /// Reserved for a future version handshake.
    VersionRequest = 0,
    /// Reserved for a future version handshake.
    VersionAck = 1,
    RegularFile = 2,
    DirectoryDescend = 3,
    DirectoryAscend = 4,
    Symlink = 5,
    Fifo = 6,
    Socket = 7,
    /// Placeholder; never emitted, decoding it is an error.
    Device = 8,
}

impl MessageType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::VersionRequest),
            1 => Some(Self::VersionAck),
            2 => Some(Self::RegularFile),
            3 => Some(Self::DirectoryDescend),
            4 => Some(Self::DirectoryAscend),
            5 => Some(Self::Symlink),
            6 => Some(Self::Fifo),
            7 => Some(Self::Socket),
            8 => Some(Self::Device),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

fn put_name(buf: &mut BytesMut, name: &OsString) {
    put_bytes(buf, &os_to_bytes(name));
}

fn get_name(payload: &mut PayloadReader<'_>, what: &'static str) -> Result<OsString> {
    bytes_to_os(payload.bytes(what)?, what)
}

// =============================================================================
// REGULAR_FILE (2)
// =============================================================================

/// Fixed part of a regular-file payload; exactly `size` content bytes follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularFile {
    pub name: OsString,
    pub mtime: i64,
    pub mode: u32,
    pub content_hash: u64,
    pub size: u64,
}

impl RegularFile {
    pub fn encode_into(&self, buf: &mut BytesMut, content: &[u8]) {
        debug_assert_eq!(content.len() as u64, self.size);
        put_name(buf, &self.name);
        buf.put_i64(self.mtime);
        buf.put_u32(self.mode);
        buf.put_u64(self.content_hash);
        put_uvarint(buf, self.size);
        buf.put_slice(content);
    }

    /// Decode the fixed fields, leaving `payload` positioned at the content.
    pub fn decode(payload: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            name: get_name(payload, "file name")?,
            mtime: payload.i64("file modification time")?,
            mode: payload.u32("file mode")?,
            content_hash: payload.u64("file hash")?,
            size: payload.uvarint("file size")?,
        })
    }
}

// =============================================================================
// DIRECTORY_DESCEND (3)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryDescend {
    pub name: OsString,
    pub mode: u32,
}

impl DirectoryDescend {
    pub fn encode_into(&self, buf: &mut BytesMut) {
        put_name(buf, &self.name);
        buf.put_u32(self.mode);
    }

    pub fn decode(payload: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            name: get_name(payload, "directory name")?,
            mode: payload.u32("directory mode")?,
        })
    }
}

// =============================================================================
// DIRECTORY_ASCEND (4)
// =============================================================================

/// Sent after a directory's children; carries the directory's own mtime,
/// which writing the children would otherwise have clobbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryAscend {
    pub mtime: i64,
}

impl DirectoryAscend {
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_i64(self.mtime);
    }

    pub fn decode(payload: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            mtime: payload.i64("directory modification time")?,
        })
    }
}

// =============================================================================
// SYMLINK (5)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symlink {
    pub name: OsString,
    pub referent: PathBuf,
    pub mtime: i64,
    pub mode: u32,
}

impl Symlink {
    pub fn encode_into(&self, buf: &mut BytesMut) {
        put_name(buf, &self.name);
        put_bytes(buf, &os_to_bytes(self.referent.as_os_str()));
        buf.put_i64(self.mtime);
        buf.put_u32(self.mode);
    }

    pub fn decode(payload: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            name: get_name(payload, "symlink name")?,
            referent: PathBuf::from(get_name(payload, "symlink referent")?),
            mtime: payload.i64("symlink modification time")?,
            mode: payload.u32("symlink mode")?,
        })
    }
}

// =============================================================================
// FIFO (6) / SOCKET (7)
// =============================================================================

/// Payload shared by FIFO and socket messages: no content, only metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialFile {
    pub name: OsString,
    pub mtime: i64,
    pub mode: u32,
}

impl SpecialFile {
    pub fn encode_into(&self, buf: &mut BytesMut) {
        put_name(buf, &self.name);
        buf.put_i64(self.mtime);
        buf.put_u32(self.mode);
    }

    pub fn decode(payload: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            name: get_name(payload, "special file name")?,
            mtime: payload.i64("special file modification time")?,
            mode: payload.u32("special file mode")?,
        })
    }
}

// =============================================================================
// DEVICE (8)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: OsString,
}

impl Device {
    pub fn encode_into(&self, buf: &mut BytesMut) {
        put_name(buf, &self.name);
    }

    pub fn decode(payload: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(Self {
            name: get_name(payload, "device name")?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
