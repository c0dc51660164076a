//! Error taxonomy for archive encoding and decoding.
//!
//! Every failure is either scoped to a single entry (the pass reports it and
//! moves on) or fatal (the directory stack or the stream itself can no longer
//! be trusted). [`ArchiveError::is_fatal`] is the single place that split is
//! decided.

use crate::archive::protocol::MessageType;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem operation on one entry failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A payload field or file content is shorter than declared.
    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: u64,
        available: u64,
    },

    /// A payload field could not be interpreted.
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("{}: hash mismatch: declared {expected:016x}, computed {actual:016x}", path.display())]
    HashMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("{}: unsupported entry type: {kind}", path.display())]
    Unsupported { path: PathBuf, kind: &'static str },

    #[error("{}: {what} not supported on this platform", path.display())]
    PlatformUnsupported { path: PathBuf, what: &'static str },

    #[error("{}: decoding {what} not implemented", path.display())]
    NotImplemented { path: PathBuf, what: &'static str },

    #[error("reserved message type {0:?} is not dispatched")]
    ReservedMessage(MessageType),

    #[error("unrecognized message type {0}")]
    UnrecognizedMessage(u32),

    #[error("invalid entry name {0:?}")]
    InvalidName(String),

    /// Creating or entering a directory failed; later frames would land in
    /// the wrong place.
    #[error("{}: cannot descend: {source}", path.display())]
    Descend {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Finalizing or leaving a directory failed.
    #[error("{}: cannot ascend: {source}", path.display())]
    Ascend {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory ascend with empty directory stack")]
    StackUnderflow,

    #[error("stream ended {depth} directory level(s) deep")]
    UnbalancedStream { depth: usize },

    /// Reading from the byte source failed or ended mid-frame.
    #[error("stream: {0}")]
    Stream(#[source] io::Error),

    /// Writing to the byte sink failed.
    #[error("sink: {0}")]
    Sink(#[source] io::Error),

    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: u64, max: u64 },
}

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole pass.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Descend { .. }
                | Self::Ascend { .. }
                | Self::StackUnderflow
                | Self::UnbalancedStream { .. }
                | Self::Stream(_)
                | Self::Sink(_)
                | Self::FrameTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
