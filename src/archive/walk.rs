//! Directory listing and entry classification.

use crate::error::{ArchiveError, Result};
use std::ffi::OsString;
use std::fs::FileType;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Coarse type of a filesystem entry, never following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    RegularFile,
    Directory,
    Symlink,
    Fifo,
    Socket,
    Device,
    Other,
}

impl EntryKind {
    #[cfg(unix)]
    pub fn classify(ft: FileType) -> Self {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_file() {
            Self::RegularFile
        } else if ft.is_dir() {
            Self::Directory
        } else if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_fifo() {
            Self::Fifo
        } else if ft.is_socket() {
            Self::Socket
        } else if ft.is_block_device() || ft.is_char_device() {
            Self::Device
        } else {
            Self::Other
        }
    }

    #[cfg(not(unix))]
    pub fn classify(ft: FileType) -> Self {
        if ft.is_file() {
            Self::RegularFile
        } else if ft.is_dir() {
            Self::Directory
        } else if ft.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegularFile => "regular file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Fifo => "FIFO",
            Self::Socket => "socket",
            Self::Device => "device",
            Self::Other => "other",
        }
    }
}

/// One immediate child of a listed directory.
///
/// `kind` is an error when the child could not be classified, typically
/// because it vanished between listing and stat.
#[derive(Debug)]
pub struct ChildEntry {
    pub name: OsString,
    pub kind: Result<EntryKind>,
}

impl ChildEntry {
    fn new(dir: &Path, name: OsString, ft: io::Result<FileType>) -> Self {
        let kind = ft
            .map(EntryKind::classify)
            .map_err(|e| ArchiveError::io(dir.join(&name), e));
        Self { name, kind }
    }
}

/// List the immediate children of `dir`.
///
/// With `sorted`, children come back in byte order of their names so a
/// transcript of the same tree is always identical. Only failing to read
/// the directory itself is an error.
pub async fn list_children(dir: &Path, sorted: bool) -> Result<Vec<ChildEntry>> {
    let mut rd = fs::read_dir(dir)
        .await
        .map_err(|e| ArchiveError::io(dir, e))?;

    let mut children = Vec::new();
    while let Some(entry) = rd.next_entry().await.map_err(|e| ArchiveError::io(dir, e))? {
        let ft = entry.file_type().await;
        children.push(ChildEntry::new(dir, entry.file_name(), ft));
    }

    if sorted {
        children.sort_by(|a, b| a.name.cmp(&b.name));
    }
    Ok(children)
}

/// Normalize a path without requiring it to exist (unlike canonicalize)
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            c => normalized.push(c),
        }
    }
    normalized
}

/// Resolve an encode target into (absolute parent, base name).
///
/// Relative targets are joined onto the current directory and `.`/`..` are
/// resolved lexically, so `.` names the current directory itself and a
/// symlink target is archived as a link rather than followed.
pub fn split_target(target: &Path) -> Result<(PathBuf, OsString)> {
    let absolute = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ArchiveError::io(target, e))?
            .join(target)
    };
    let normalized = normalize_path(&absolute);

    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(base)) => Ok((parent.to_path_buf(), base.to_os_string())),
        _ => Err(ArchiveError::Unsupported {
            path: target.to_path_buf(),
            kind: "filesystem root",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_children_sorted_and_classified() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
        std::fs::create_dir(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("c.txt"), "c").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("b.txt", tmp.path().join("link")).unwrap();

        let children = list_children(tmp.path(), true).await.unwrap();
        let names: Vec<_> = children
            .iter()
            .map(|c| c.name.to_string_lossy().into_owned())
            .collect();

        #[cfg(unix)]
        assert_eq!(names, vec!["a", "b.txt", "c.txt", "link"]);
        assert_eq!(*children[0].kind.as_ref().unwrap(), EntryKind::Directory);
        assert_eq!(*children[1].kind.as_ref().unwrap(), EntryKind::RegularFile);
        #[cfg(unix)]
        assert_eq!(*children[3].kind.as_ref().unwrap(), EntryKind::Symlink);
    }

    #[test]
    fn test_unclassifiable_child_keeps_its_name() {
        let child = ChildEntry::new(
            Path::new("/src"),
            OsString::from("gone"),
            Err(io::Error::from(io::ErrorKind::NotFound)),
        );
        assert_eq!(child.name, "gone");
        match child.kind {
            Err(ArchiveError::Io { path, .. }) => assert_eq!(path, Path::new("/src/gone")),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_missing_dir_names_path() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone");
        let err = list_children(&missing, false).await.unwrap_err();
        match err {
            ArchiveError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_split_target_dot_segments() {
        let cwd = std::env::current_dir().unwrap();

        let (parent, base) = split_target(Path::new(".")).unwrap();
        assert_eq!(parent, cwd.parent().unwrap());
        assert_eq!(base, cwd.file_name().unwrap());

        let (parent, base) = split_target(Path::new("..")).unwrap();
        let up = cwd.parent().unwrap();
        assert_eq!(parent, up.parent().unwrap());
        assert_eq!(base, up.file_name().unwrap());

        let (parent, base) = split_target(Path::new("./testdata")).unwrap();
        assert_eq!(parent, cwd);
        assert_eq!(base, "testdata");

        let (parent, base) = split_target(Path::new("sub/../other/x")).unwrap();
        assert_eq!(parent, cwd.join("other"));
        assert_eq!(base, "x");
    }

    #[cfg(unix)]
    #[test]
    fn test_split_target_rejects_root() {
        assert!(matches!(
            split_target(Path::new("/")),
            Err(ArchiveError::Unsupported { .. })
        ));
    }
}
