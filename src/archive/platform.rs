//! Platform operations: special-file creation, raw mode bits, and the
//! conversion between entry names and wire bytes.

use crate::error::{ArchiveError, Result};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fs::Metadata;
use std::io;
use std::path::Path;

/// Permission bits of a raw mode that are replayed. Setuid, setgid and
/// sticky bits from the stream are dropped.
pub const PERMISSION_MASK: u32 = 0o777;

#[cfg(unix)]
pub fn os_to_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(name.as_bytes())
}

#[cfg(not(unix))]
pub fn os_to_bytes(name: &OsStr) -> Cow<'_, [u8]> {
    match name.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

#[cfg(unix)]
pub fn bytes_to_os(bytes: &[u8], _what: &'static str) -> Result<OsString> {
    use std::os::unix::ffi::OsStrExt;
    Ok(OsStr::from_bytes(bytes).to_os_string())
}

#[cfg(not(unix))]
pub fn bytes_to_os(bytes: &[u8], what: &'static str) -> Result<OsString> {
    String::from_utf8(bytes.to_vec())
        .map(OsString::from)
        .map_err(|e| ArchiveError::Malformed {
            what,
            reason: e.to_string(),
        })
}

/// Raw `st_mode` bits as the host reports them.
#[cfg(unix)]
pub fn mode_of(meta: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

/// Synthesized Unix-style mode for hosts without `st_mode`.
#[cfg(not(unix))]
pub fn mode_of(meta: &Metadata) -> u32 {
    let ft = meta.file_type();
    let kind = if ft.is_dir() {
        0o040000
    } else if ft.is_symlink() {
        0o120000
    } else {
        0o100000
    };
    let perm = if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    };
    let exec = if ft.is_dir() { 0o111 } else { 0 };
    kind | perm | exec
}

/// Modification time in whole seconds since the Unix epoch.
pub fn mtime_of(meta: &Metadata) -> i64 {
    filetime::FileTime::from_last_modification_time(meta).unix_seconds()
}

/// Apply the permission bits of `mode` to `path`.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & PERMISSION_MASK))
}

#[cfg(not(unix))]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    std::fs::set_permissions(path, perms)
}

/// Set both access and modification time to `mtime`, following symlinks.
pub fn set_mtime(path: &Path, mtime: i64) -> io::Result<()> {
    let t = filetime::FileTime::from_unix_time(mtime, 0);
    filetime::set_file_times(path, t, t)
}

/// Set the times of a symlink itself.
pub fn set_symlink_mtime(path: &Path, mtime: i64) -> io::Result<()> {
    let t = filetime::FileTime::from_unix_time(mtime, 0);
    filetime::set_symlink_file_times(path, t, t)
}

#[cfg(unix)]
mod unix {
    use super::{io, Path, PERMISSION_MASK};
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    fn path_to_c(path: &Path) -> io::Result<CString> {
        CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains interior NUL"))
    }

    pub fn mkfifo(path: &Path, mode: u32) -> io::Result<()> {
        let c_path = path_to_c(path)?;
        let bits = (mode & PERMISSION_MASK) as libc::mode_t;
        let result = unsafe { libc::mkfifo(c_path.as_ptr(), bits) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Binding a listener creates the socket node; it stays after the
    /// listener is dropped.
    pub fn mksocket(path: &Path) -> io::Result<()> {
        let _listener = std::os::unix::net::UnixListener::bind(path)?;
        Ok(())
    }
}

/// Create a FIFO at `path` with the permission bits of `mode`.
#[cfg(unix)]
pub fn create_fifo(path: &Path, mode: u32) -> Result<()> {
    unix::mkfifo(path, mode).map_err(|e| ArchiveError::io(path, e))
}

#[cfg(not(unix))]
pub fn create_fifo(path: &Path, _mode: u32) -> Result<()> {
    Err(ArchiveError::PlatformUnsupported {
        path: path.to_path_buf(),
        what: "FIFO creation",
    })
}

/// Create a Unix domain socket node at `path`.
#[cfg(unix)]
pub fn create_socket(path: &Path) -> Result<()> {
    unix::mksocket(path).map_err(|e| ArchiveError::io(path, e))
}

#[cfg(not(unix))]
pub fn create_socket(path: &Path) -> Result<()> {
    Err(ArchiveError::PlatformUnsupported {
        path: path.to_path_buf(),
        what: "socket creation",
    })
}
