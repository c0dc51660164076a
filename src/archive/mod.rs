//! Streaming archive format.
//!
//! An archive is a bare sequence of frames with no header or trailer:
//!
//! ```text
//! +-------------+---------------+-----------------+
//! | tag: u32 BE | len: uvarint  | payload (len B) |
//! +-------------+---------------+-----------------+
//! ```
//!
//! The encoder walks a tree in pre-order. A directory is bracketed by
//! DIRECTORY_DESCEND before its children and DIRECTORY_ASCEND after them; the
//! ascend carries the directory's own mtime, since writing the children
//! changes it. The decoder tracks its position with a directory stack, so a
//! stream is well formed only when every descend has a matching ascend.
//!
//! ```text
//! create a/            DESCEND a
//!   a/b.txt              REGULAR_FILE b.txt <content>
//!   a/link -> b.txt      SYMLINK link b.txt
//!                      ASCEND <mtime of a>
//! ```
//!
//! Failures are either per entry (reported, the pass continues) or fatal
//! (the pass stops); see [`crate::error::ArchiveError::is_fatal`].

pub mod decoder;
pub mod dirstack;
pub mod encoder;
pub mod frame;
pub mod hash;
pub mod platform;
pub mod protocol;
pub mod scalar;
pub mod stats;
pub mod walk;

pub use decoder::{DecodedEntry, Decoder, DecoderConfig};
pub use encoder::{EncodeReport, Encoder, EncoderConfig, EntryFailure};
pub use frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
pub use hash::{hash, ContentHasher, HashingWriter};
pub use protocol::MessageType;
pub use stats::ArchiveStats;
