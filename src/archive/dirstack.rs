//! Decoder position in the destination tree.
//!
//! The stack holds one frame per directory entered below the extraction root.
//! Paths are always built from the root plus the stack; nothing here touches
//! the process working directory.

use crate::error::{ArchiveError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct Level {
    name: OsString,
    /// Permission bits to apply when leaving, for directories this pass created.
    deferred_mode: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DirStack {
    root: PathBuf,
    current: PathBuf,
    levels: Vec<Level>,
}

/// A directory that was just left, with what remains to be applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popped {
    pub path: PathBuf,
    pub deferred_mode: Option<u32>,
}

impl DirStack {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            current: root.clone(),
            root,
            levels: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that leaf entries are currently written into.
    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Path of `name` inside the current directory.
    pub fn child(&self, name: &OsString) -> PathBuf {
        self.current.join(name)
    }

    pub fn push(&mut self, name: OsString, deferred_mode: Option<u32>) {
        self.current.push(&name);
        self.levels.push(Level {
            name,
            deferred_mode,
        });
    }

    /// Leave the current directory. Fails at depth 0.
    pub fn pop(&mut self) -> Result<Popped> {
        let level = self.levels.pop().ok_or(ArchiveError::StackUnderflow)?;
        let path = self.current.clone();
        self.current.pop();
        debug_assert_eq!(path.file_name(), Some(level.name.as_os_str()));
        Ok(Popped {
            path,
            deferred_mode: level.deferred_mode,
        })
    }

    /// Fails unless every descend has been matched by an ascend.
    pub fn ensure_balanced(&self) -> Result<()> {
        if self.levels.is_empty() {
            Ok(())
        } else {
            Err(ArchiveError::UnbalancedStream {
                depth: self.levels.len(),
            })
        }
    }
}
