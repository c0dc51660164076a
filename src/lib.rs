//! dirstream - stream a directory tree as a sequence of framed messages and
//! recreate it on the other side of a pipe.

pub mod archive;
pub mod error;

pub use error::{ArchiveError, Result};
