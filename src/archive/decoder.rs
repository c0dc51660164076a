//! Archive decoder.
//!
//! Replays a frame stream into a destination tree. Each frame yields one
//! [`DecodedEntry`] or one error; per-entry errors leave the stream usable
//! and the caller keeps pulling. A fatal error ends the pass.

use crate::archive::dirstack::DirStack;
use crate::archive::frame::{read_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::archive::hash::HashingWriter;
use crate::archive::platform::{
    create_fifo, create_socket, os_to_bytes, set_mode, set_mtime, set_symlink_mtime,
    PERMISSION_MASK,
};
use crate::archive::protocol::{
    Device, DirectoryAscend, DirectoryDescend, MessageType, RegularFile, SpecialFile, Symlink,
};
use crate::archive::scalar::PayloadReader;
use crate::archive::stats::ArchiveStats;
use crate::archive::walk::EntryKind;
use crate::error::{ArchiveError, Result};
use bytes::BytesMut;
use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};

/// Decoder configuration
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Frames with a larger declared payload are rejected before allocation
    pub max_frame_size: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// One entry materialized from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub kind: MessageType,
    pub path: PathBuf,
}

/// Decoder state
pub struct Decoder<R> {
    source: BufReader<R>,
    config: DecoderConfig,
    stack: DirStack,
    /// Payload of the current frame; reused across frames
    payload: BytesMut,
    /// Verified content of the current file; reused across files
    content: Vec<u8>,
    finished: bool,
    stats: ArchiveStats,
}

/// Entry names must be a single normal path component.
fn validate_name(name: &OsStr) -> Result<()> {
    let invalid = || ArchiveError::InvalidName(name.to_string_lossy().into_owned());

    if name.is_empty() || os_to_bytes(name).contains(&0) {
        return Err(invalid());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == name => Ok(()),
        _ => Err(invalid()),
    }
}

/// Run blocking filesystem work off the async runtime.
async fn blocking<T, F>(path: &Path, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ArchiveError::io(path, io::Error::other(e)))?
}

/// Remove whatever occupies `path`, recursively for directories.
async fn remove_entry(path: &Path, meta: &std::fs::Metadata) -> io::Result<()> {
    if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

/// Directories are created owner-accessible so their children can be
/// written; the requested mode is applied on ascend.
async fn create_dir(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode((mode & PERMISSION_MASK) | 0o700);
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path).await
}

impl<R: AsyncRead + Unpin> Decoder<R> {
    /// Decoder writing below `root`, which must already exist.
    pub fn new(source: R, root: impl Into<PathBuf>, config: DecoderConfig) -> Self {
        Self {
            source: BufReader::new(source),
            config,
            stack: DirStack::new(root),
            payload: BytesMut::new(),
            content: Vec::new(),
            finished: false,
            stats: ArchiveStats::new(),
        }
    }

    /// Directories entered and not yet left.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn stats(&self) -> &ArchiveStats {
        &self.stats
    }

    /// Decode the next frame.
    ///
    /// Returns `None` at the end of a balanced stream and after a fatal
    /// error has been returned.
    pub async fn next_entry(&mut self) -> Option<Result<DecodedEntry>> {
        if self.finished {
            return None;
        }

        let tag = match read_frame(&mut self.source, &mut self.payload, self.config.max_frame_size)
            .await
        {
            Ok(Some(tag)) => tag,
            Ok(None) => {
                self.finished = true;
                return self.stack.ensure_balanced().err().map(Err);
            }
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        let payload = std::mem::take(&mut self.payload);
        let result = self.dispatch(tag, &payload).await;
        self.payload = payload;

        match &result {
            Ok(entry) => tracing::debug!("{:?} {}", entry.kind, entry.path.display()),
            Err(e) if e.is_fatal() => self.finished = true,
            Err(_) => self.stats.failed += 1,
        }
        Some(result)
    }

    /// Decode the whole stream, logging per-entry failures.
    ///
    /// Returns the pass statistics, or the first fatal error.
    pub async fn run(&mut self) -> Result<ArchiveStats> {
        while let Some(result) = self.next_entry().await {
            match result {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("cannot decode: {}", e),
            }
        }
        Ok(self.stats.clone())
    }

    async fn dispatch(&mut self, tag: u32, payload: &[u8]) -> Result<DecodedEntry> {
        let msg_type = MessageType::from_u32(tag).ok_or(ArchiveError::UnrecognizedMessage(tag))?;
        let mut reader = PayloadReader::new(payload);

        match msg_type {
            MessageType::VersionRequest | MessageType::VersionAck => {
                Err(ArchiveError::ReservedMessage(msg_type))
            }
            MessageType::RegularFile => {
                let header = RegularFile::decode(&mut reader)?;
                self.handle_file(header, &mut reader).await
            }
            MessageType::DirectoryDescend => {
                let descend = DirectoryDescend::decode(&mut reader).map_err(|e| {
                    ArchiveError::Descend {
                        path: self.stack.current().to_path_buf(),
                        source: io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
                    }
                })?;
                self.handle_descend(descend).await
            }
            MessageType::DirectoryAscend => {
                let ascend = DirectoryAscend::decode(&mut reader).map_err(|e| {
                    ArchiveError::Ascend {
                        path: self.stack.current().to_path_buf(),
                        source: io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
                    }
                })?;
                self.handle_ascend(ascend).await
            }
            MessageType::Symlink => {
                let symlink = Symlink::decode(&mut reader)?;
                self.handle_symlink(symlink).await
            }
            MessageType::Fifo | MessageType::Socket => {
                let special = SpecialFile::decode(&mut reader)?;
                self.handle_special(msg_type, special).await
            }
            MessageType::Device => {
                let device = Device::decode(&mut reader)?;
                Err(ArchiveError::NotImplemented {
                    path: self.stack.child(&device.name),
                    what: "device node",
                })
            }
        }
    }

    async fn handle_file(
        &mut self,
        header: RegularFile,
        reader: &mut PayloadReader<'_>,
    ) -> Result<DecodedEntry> {
        validate_name(&header.name)?;
        let path = self.stack.child(&header.name);
        let mut content = reader.take(header.size, "file content")?;

        // Verify before touching the destination.
        self.content.clear();
        let mut tee = HashingWriter::new(&mut self.content);
        io::copy(&mut content, &mut tee).map_err(|e| ArchiveError::io(&path, e))?;
        let actual = tee.digest();
        if actual != header.content_hash {
            return Err(ArchiveError::HashMismatch {
                path,
                expected: header.content_hash,
                actual,
            });
        }

        match fs::symlink_metadata(&path).await {
            Ok(meta) if !meta.is_file() => remove_entry(&path, &meta)
                .await
                .map_err(|e| ArchiveError::io(&path, e))?,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ArchiveError::io(&path, e)),
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(false);
        let mut file = match options.open(&path).await {
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                // A read-only file from an earlier pass; replace it.
                fs::remove_file(&path)
                    .await
                    .map_err(|e| ArchiveError::io(&path, e))?;
                options.open(&path).await
            }
            other => other,
        }
        .map_err(|e| ArchiveError::io(&path, e))?;

        file.write_all(&self.content)
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;
        file.set_len(header.size)
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;
        file.flush().await.map_err(|e| ArchiveError::io(&path, e))?;
        drop(file);

        let (mode, mtime) = (header.mode, header.mtime);
        blocking(&path, {
            let path = path.clone();
            move || {
                set_mode(&path, mode).map_err(|e| ArchiveError::io(&path, e))?;
                set_mtime(&path, mtime).map_err(|e| ArchiveError::io(&path, e))
            }
        })
        .await?;

        self.stats.files += 1;
        self.stats.bytes += header.size;
        Ok(DecodedEntry {
            kind: MessageType::RegularFile,
            path,
        })
    }

    async fn handle_descend(&mut self, descend: DirectoryDescend) -> Result<DecodedEntry> {
        let path = self.stack.child(&descend.name);
        let fatal = |source: io::Error| ArchiveError::Descend {
            path: path.clone(),
            source,
        };

        if let Err(e) = validate_name(&descend.name) {
            return Err(fatal(io::Error::new(io::ErrorKind::InvalidInput, e.to_string())));
        }

        let created = match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_dir() => false,
            Ok(meta) => {
                remove_entry(&path, &meta).await.map_err(fatal)?;
                create_dir(&path, descend.mode).await.map_err(fatal)?;
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                create_dir(&path, descend.mode).await.map_err(fatal)?;
                true
            }
            Err(e) => return Err(fatal(e)),
        };

        self.stack
            .push(descend.name, created.then_some(descend.mode));
        self.stats.dirs += 1;
        Ok(DecodedEntry {
            kind: MessageType::DirectoryDescend,
            path,
        })
    }

    async fn handle_ascend(&mut self, ascend: DirectoryAscend) -> Result<DecodedEntry> {
        let popped = self.stack.pop()?;
        let path = popped.path;

        let result = tokio::task::spawn_blocking({
            let path = path.clone();
            let mtime = ascend.mtime;
            move || {
                set_mtime(&path, mtime)?;
                match popped.deferred_mode {
                    Some(mode) => set_mode(&path, mode),
                    None => Ok(()),
                }
            }
        })
        .await
        .map_err(io::Error::other)
        .and_then(|r| r);

        if let Err(source) = result {
            return Err(ArchiveError::Ascend { path, source });
        }
        Ok(DecodedEntry {
            kind: MessageType::DirectoryAscend,
            path,
        })
    }

    async fn handle_symlink(&mut self, symlink: Symlink) -> Result<DecodedEntry> {
        validate_name(&symlink.name)?;
        let path = self.stack.child(&symlink.name);

        let keep = match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                let current = fs::read_link(&path)
                    .await
                    .map_err(|e| ArchiveError::io(&path, e))?;
                if current == symlink.referent {
                    true
                } else {
                    remove_entry(&path, &meta)
                        .await
                        .map_err(|e| ArchiveError::io(&path, e))?;
                    false
                }
            }
            Ok(meta) => {
                remove_entry(&path, &meta)
                    .await
                    .map_err(|e| ArchiveError::io(&path, e))?;
                false
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(ArchiveError::io(&path, e)),
        };

        if !keep {
            #[cfg(unix)]
            fs::symlink(&symlink.referent, &path)
                .await
                .map_err(|e| ArchiveError::io(&path, e))?;

            #[cfg(windows)]
            blocking(&path, {
                let referent = symlink.referent.clone();
                let path = path.clone();
                move || {
                    std::os::windows::fs::symlink_file(&referent, &path)
                        .map_err(|e| ArchiveError::io(&path, e))
                }
            })
            .await?;
        }

        let mtime = symlink.mtime;
        let link = path.clone();
        match tokio::task::spawn_blocking(move || set_symlink_mtime(&link, mtime)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to set mtime on {}: {}", path.display(), e),
            Err(e) => tracing::warn!("Failed to set mtime on {}: {}", path.display(), e),
        }

        self.stats.symlinks += 1;
        Ok(DecodedEntry {
            kind: MessageType::Symlink,
            path,
        })
    }

    async fn handle_special(
        &mut self,
        kind: MessageType,
        special: SpecialFile,
    ) -> Result<DecodedEntry> {
        validate_name(&special.name)?;
        let path = self.stack.child(&special.name);
        let wanted = if kind == MessageType::Fifo {
            EntryKind::Fifo
        } else {
            EntryKind::Socket
        };

        let exists = match fs::symlink_metadata(&path).await {
            Ok(meta) if EntryKind::classify(meta.file_type()) == wanted => true,
            Ok(meta) => {
                remove_entry(&path, &meta)
                    .await
                    .map_err(|e| ArchiveError::io(&path, e))?;
                false
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(ArchiveError::io(&path, e)),
        };

        let (mode, mtime) = (special.mode, special.mtime);
        blocking(&path, {
            let path = path.clone();
            move || {
                if !exists {
                    match wanted {
                        EntryKind::Fifo => create_fifo(&path, mode)?,
                        _ => create_socket(&path)?,
                    }
                }
                set_mode(&path, mode).map_err(|e| ArchiveError::io(&path, e))?;
                set_mtime(&path, mtime).map_err(|e| ArchiveError::io(&path, e))
            }
        })
        .await?;

        if kind == MessageType::Fifo {
            self.stats.fifos += 1;
        } else {
            self.stats.sockets += 1;
        }
        Ok(DecodedEntry { kind, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::frame::write_frame;
    use crate::archive::hash::hash;
    use crate::archive::scalar::{put_bytes, put_uvarint};
    use bytes::BufMut;
    use std::ffi::OsString;
    use std::fs as stdfs;
    use tempfile::TempDir;

    /// Builds a frame transcript by hand.
    #[derive(Default)]
    struct Transcript {
        data: Vec<u8>,
    }

    impl Transcript {
        async fn frame(&mut self, tag: MessageType, payload: &[u8]) -> &mut Self {
            write_frame(&mut self.data, tag, payload).await.unwrap();
            self
        }

        async fn file(&mut self, name: &str, content: &[u8]) -> &mut Self {
            self.file_with_hash(name, content, hash(content)).await
        }

        async fn file_with_hash(&mut self, name: &str, content: &[u8], hash: u64) -> &mut Self {
            let mut buf = BytesMut::new();
            RegularFile {
                name: OsString::from(name),
                mtime: 1_600_000_000,
                mode: 0o100644,
                content_hash: hash,
                size: content.len() as u64,
            }
            .encode_into(&mut buf, content);
            self.frame(MessageType::RegularFile, &buf).await
        }

        async fn descend(&mut self, name: &str) -> &mut Self {
            let mut buf = BytesMut::new();
            DirectoryDescend {
                name: OsString::from(name),
                mode: 0o040755,
            }
            .encode_into(&mut buf);
            self.frame(MessageType::DirectoryDescend, &buf).await
        }

        async fn ascend(&mut self) -> &mut Self {
            let mut buf = BytesMut::new();
            DirectoryAscend {
                mtime: 1_500_000_000,
            }
            .encode_into(&mut buf);
            self.frame(MessageType::DirectoryAscend, &buf).await
        }

        fn raw(&mut self, tag: u32, payload: &[u8]) -> &mut Self {
            self.data.put_u32(tag);
            put_uvarint(&mut self.data, payload.len() as u64);
            self.data.extend_from_slice(payload);
            self
        }
    }

    async fn collect(data: &[u8], root: &Path) -> Vec<Result<DecodedEntry>> {
        let mut decoder = Decoder::new(data, root, DecoderConfig::default());
        let mut out = Vec::new();
        while let Some(result) = decoder.next_entry().await {
            out.push(result);
        }
        out
    }

    #[tokio::test]
    async fn test_single_file() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.file("greeting.txt", b"hello").await;

        let results = collect(&t.data, tmp.path()).await;
        assert_eq!(results.len(), 1);
        let entry = results[0].as_ref().unwrap();
        assert_eq!(entry.kind, MessageType::RegularFile);
        assert_eq!(entry.path, tmp.path().join("greeting.txt"));

        let path = tmp.path().join("greeting.txt");
        assert_eq!(stdfs::read(&path).unwrap(), b"hello");
        let meta = stdfs::metadata(&path).unwrap();
        assert_eq!(crate::archive::platform::mtime_of(&meta), 1_600_000_000);
        #[cfg(unix)]
        assert_eq!(crate::archive::platform::mode_of(&meta) & 0o7777, 0o644);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_setuid_bit_is_not_replayed() {
        let tmp = TempDir::new().unwrap();
        let mut payload = BytesMut::new();
        RegularFile {
            name: OsString::from("suid"),
            mtime: 1_600_000_000,
            mode: 0o104755,
            content_hash: hash(b"x"),
            size: 1,
        }
        .encode_into(&mut payload, b"x");

        let mut t = Transcript::default();
        t.frame(MessageType::RegularFile, &payload).await;
        let results = collect(&t.data, tmp.path()).await;
        assert!(results[0].is_ok());

        let meta = stdfs::metadata(tmp.path().join("suid")).unwrap();
        assert_eq!(crate::archive::platform::mode_of(&meta) & 0o7777, 0o755);
    }

    #[tokio::test]
    async fn test_hash_mismatch_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.file_with_hash("bad.txt", b"hello", hash(b"hellO"))
            .await
            .file("good.txt", b"ok")
            .await;

        let results = collect(&t.data, tmp.path()).await;
        assert_eq!(results.len(), 2);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, ArchiveError::HashMismatch { .. }));
        assert!(!err.is_fatal());
        assert!(!tmp.path().join("bad.txt").exists());
        assert_eq!(stdfs::read(tmp.path().join("good.txt")).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_declared_size_beyond_payload() {
        let tmp = TempDir::new().unwrap();
        let mut payload = BytesMut::new();
        put_bytes(&mut payload, b"short.txt");
        payload.put_i64(0);
        payload.put_u32(0o100644);
        payload.put_u64(hash(b"abc"));
        put_uvarint(&mut payload, 10);
        payload.put_slice(b"abc");

        let mut t = Transcript::default();
        t.raw(MessageType::RegularFile.as_u32(), &payload)
            .file("next.txt", b"n")
            .await;

        let results = collect(&t.data, tmp.path()).await;
        assert!(matches!(
            results[0],
            Err(ArchiveError::Truncated {
                needed: 10,
                available: 3,
                ..
            })
        ));
        assert!(!tmp.path().join("short.txt").exists());
        assert!(results[1].is_ok());
    }

    #[tokio::test]
    async fn test_existing_file_is_shrunk() {
        let tmp = TempDir::new().unwrap();
        stdfs::write(tmp.path().join("f"), "a much longer previous body").unwrap();

        let mut t = Transcript::default();
        t.file("f", b"new").await;
        let results = collect(&t.data, tmp.path()).await;
        assert!(results[0].is_ok());
        assert_eq!(stdfs::read(tmp.path().join("f")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_nested_directories_and_mtime() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.descend("a")
            .await
            .descend("b")
            .await
            .file("c.txt", b"deep")
            .await
            .ascend()
            .await
            .ascend()
            .await;

        let mut decoder = Decoder::new(&t.data[..], tmp.path(), DecoderConfig::default());
        let stats = decoder.run().await.unwrap();
        assert_eq!(stats.dirs, 2);
        assert_eq!(stats.files, 1);
        assert_eq!(decoder.depth(), 0);

        assert_eq!(stdfs::read(tmp.path().join("a/b/c.txt")).unwrap(), b"deep");
        for dir in ["a", "a/b"] {
            let meta = stdfs::metadata(tmp.path().join(dir)).unwrap();
            assert_eq!(crate::archive::platform::mtime_of(&meta), 1_500_000_000);
            #[cfg(unix)]
            assert_eq!(crate::archive::platform::mode_of(&meta) & 0o7777, 0o755);
        }
    }

    #[tokio::test]
    async fn test_file_replaces_directory_and_back() {
        let tmp = TempDir::new().unwrap();
        stdfs::create_dir_all(tmp.path().join("x/inner")).unwrap();
        stdfs::write(tmp.path().join("y"), "plain").unwrap();

        let mut t = Transcript::default();
        t.file("x", b"now a file")
            .await
            .descend("y")
            .await
            .file("z", b"inside")
            .await
            .ascend()
            .await;

        let mut decoder = Decoder::new(&t.data[..], tmp.path(), DecoderConfig::default());
        decoder.run().await.unwrap();

        assert_eq!(stdfs::read(tmp.path().join("x")).unwrap(), b"now a file");
        assert!(tmp.path().join("y").is_dir());
        assert_eq!(stdfs::read(tmp.path().join("y/z")).unwrap(), b"inside");
    }

    #[tokio::test]
    async fn test_ascend_at_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.ascend().await.file("never.txt", b"x").await;

        let results = collect(&t.data, tmp.path()).await;
        assert_eq!(results.len(), 1);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, ArchiveError::StackUnderflow));
        assert!(err.is_fatal());
        assert!(!tmp.path().join("never.txt").exists());
    }

    #[tokio::test]
    async fn test_unbalanced_stream_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.descend("open").await;

        let mut decoder = Decoder::new(&t.data[..], tmp.path(), DecoderConfig::default());
        assert!(decoder.next_entry().await.unwrap().is_ok());
        assert!(matches!(
            decoder.next_entry().await,
            Some(Err(ArchiveError::UnbalancedStream { depth: 1 }))
        ));
        assert!(decoder.next_entry().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_reserved_and_device_frames_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut device = BytesMut::new();
        Device {
            name: OsString::from("sda"),
        }
        .encode_into(&mut device);

        let mut t = Transcript::default();
        t.raw(99, b"whatever")
            .raw(MessageType::VersionRequest.as_u32(), b"")
            .frame(MessageType::Device, &device)
            .await
            .file("after.txt", b"still here")
            .await;

        let mut decoder = Decoder::new(&t.data[..], tmp.path(), DecoderConfig::default());
        let mut results = Vec::new();
        while let Some(r) = decoder.next_entry().await {
            results.push(r);
        }

        assert!(matches!(results[0], Err(ArchiveError::UnrecognizedMessage(99))));
        assert!(matches!(
            results[1],
            Err(ArchiveError::ReservedMessage(MessageType::VersionRequest))
        ));
        assert!(matches!(results[2], Err(ArchiveError::NotImplemented { .. })));
        assert!(results[3].is_ok());
        assert_eq!(decoder.stats().failed, 3);
        assert_eq!(
            stdfs::read(tmp.path().join("after.txt")).unwrap(),
            b"still here"
        );
    }

    #[tokio::test]
    async fn test_invalid_names() {
        for name in ["", ".", "..", "a/b", "nul\0byte"] {
            assert!(
                validate_name(OsStr::new(name)).is_err(),
                "{name:?} should be rejected"
            );
        }
        validate_name(OsStr::new("fine.txt")).unwrap();

        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.file("../escape", b"x").await.descend("..").await;

        let results = collect(&t.data, tmp.path()).await;
        assert!(matches!(results[0], Err(ArchiveError::InvalidName(_))));
        assert!(matches!(results[1], Err(ArchiveError::Descend { .. })));
        assert!(!tmp.path().parent().unwrap().join("escape").exists());
    }

    #[tokio::test]
    async fn test_truncated_stream_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.file("whole.txt", b"complete").await;
        let cut = t.data.len() - 3;

        let results = collect(&t.data[..cut], tmp.path()).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ArchiveError::Stream(_))));
    }

    #[tokio::test]
    async fn test_corrupt_frame_length_aborts_pass() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.descend("a").await;
        t.data.extend_from_slice(&MessageType::RegularFile.as_u32().to_be_bytes());
        t.data.extend_from_slice(&[0xFF; 10]);

        let mut decoder = Decoder::new(&t.data[..], tmp.path(), DecoderConfig::default());
        let err = decoder.run().await.unwrap_err();
        assert!(matches!(err, ArchiveError::Stream(_)));
        assert_eq!(decoder.depth(), 1);
        assert!(decoder.next_entry().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut t = Transcript::default();
        t.file("big.bin", &[0u8; 128]).await;

        let mut decoder = Decoder::new(
            &t.data[..],
            tmp.path(),
            DecoderConfig { max_frame_size: 64 },
        );
        assert!(matches!(
            decoder.next_entry().await,
            Some(Err(ArchiveError::FrameTooLarge { max: 64, .. }))
        ));
        assert!(decoder.next_entry().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_replaced_only_when_referent_differs() {
        let tmp = TempDir::new().unwrap();
        std::os::unix::fs::symlink("old-target", tmp.path().join("link")).unwrap();

        let mut payload = BytesMut::new();
        Symlink {
            name: OsString::from("link"),
            referent: PathBuf::from("new-target"),
            mtime: 1_400_000_000,
            mode: 0o120777,
        }
        .encode_into(&mut payload);

        let mut t = Transcript::default();
        t.frame(MessageType::Symlink, &payload).await;
        t.frame(MessageType::Symlink, &payload).await;

        let results = collect(&t.data, tmp.path()).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(
            stdfs::read_link(tmp.path().join("link")).unwrap(),
            PathBuf::from("new-target")
        );
        let meta = stdfs::symlink_metadata(tmp.path().join("link")).unwrap();
        assert_eq!(crate::archive::platform::mtime_of(&meta), 1_400_000_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fifo_created_and_kept() {
        use std::os::unix::fs::FileTypeExt;

        let tmp = TempDir::new().unwrap();
        let mut payload = BytesMut::new();
        SpecialFile {
            name: OsString::from("pipe"),
            mtime: 1_300_000_000,
            mode: 0o010600,
        }
        .encode_into(&mut payload);

        let mut t = Transcript::default();
        t.frame(MessageType::Fifo, &payload).await;
        t.frame(MessageType::Fifo, &payload).await;

        let results = collect(&t.data, tmp.path()).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let meta = stdfs::symlink_metadata(tmp.path().join("pipe")).unwrap();
        assert!(meta.file_type().is_fifo());
        assert_eq!(crate::archive::platform::mode_of(&meta) & 0o7777, 0o600);
        assert_eq!(crate::archive::platform::mtime_of(&meta), 1_300_000_000);
    }
}
