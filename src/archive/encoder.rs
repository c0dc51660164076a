//! Archive encoder.
//!
//! Walks a tree in pre-order and writes one frame per entry. A directory is
//! bracketed by a descend frame before its children and an ascend frame
//! after them, so the recursion here and the decoder's [`DirStack`] push and
//! pop in the same order.
//!
//! [`DirStack`]: crate::archive::dirstack::DirStack

use crate::archive::frame::write_frame;
use crate::archive::hash::hash;
use crate::archive::platform::{mode_of, mtime_of};
use crate::archive::protocol::{
    DirectoryAscend, DirectoryDescend, MessageType, RegularFile, SpecialFile, Symlink,
};
use crate::archive::stats::ArchiveStats;
use crate::archive::walk::{list_children, split_target, ChildEntry, EntryKind};
use crate::error::{ArchiveError, Result};
use bytes::BytesMut;
use futures::future::{FutureExt, LocalBoxFuture};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Encoder configuration
#[derive(Debug, Clone, Default)]
pub struct EncoderConfig {
    /// Visit children in name order, making transcripts reproducible
    pub sort_children: bool,
}

/// An entry that could not be archived.
#[derive(Debug)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub error: ArchiveError,
}

/// Outcome of encoding one target.
#[derive(Debug, Default)]
pub struct EncodeReport {
    /// Frames written for this target
    pub frames: u64,
    /// Entries skipped, in visit order
    pub failures: Vec<EntryFailure>,
}

impl EncodeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Encoder state
pub struct Encoder<W> {
    sink: BufWriter<W>,
    config: EncoderConfig,
    /// Content of the file being encoded; reused across files
    file_buf: Vec<u8>,
    /// Payload of the frame being built; reused across frames
    message_buf: BytesMut,
    frames: u64,
    stats: ArchiveStats,
}

impl<W: AsyncWrite + Unpin> Encoder<W> {
    pub fn new(sink: W, config: EncoderConfig) -> Self {
        Self {
            sink: BufWriter::new(sink),
            config,
            file_buf: Vec::new(),
            message_buf: BytesMut::new(),
            frames: 0,
            stats: ArchiveStats::new(),
        }
    }

    /// Encode the entry at `target` and, for a directory, everything below it.
    ///
    /// Entry failures are collected in the report and do not stop the walk.
    /// `Err` means the transcript itself is broken and must be abandoned.
    pub async fn encode(&mut self, target: &Path) -> Result<EncodeReport> {
        let mut report = EncodeReport::default();
        let start = self.frames;

        let root = match split_target(target) {
            Ok((parent, base)) => Some((parent.join(&base), base)),
            Err(e) => {
                self.record_failure(&mut report, target.to_path_buf(), e);
                None
            }
        };

        if let Some((path, name)) = root {
            let result = match fs::symlink_metadata(&path).await {
                Ok(meta) => {
                    let kind = EntryKind::classify(meta.file_type());
                    self.encode_entry(&path, name, kind, &mut report).await
                }
                Err(e) => Err(ArchiveError::io(&path, e)),
            };
            if let Err(e) = result {
                if e.is_fatal() {
                    return Err(e);
                }
                self.record_failure(&mut report, path, e);
            }
        }

        report.frames = self.frames - start;
        Ok(report)
    }

    /// Flush buffered frames to the sink.
    pub async fn flush(&mut self) -> Result<()> {
        self.sink.flush().await.map_err(ArchiveError::Sink)
    }

    /// Flush and return the statistics accumulated over every target.
    pub async fn finish(&mut self) -> Result<ArchiveStats> {
        self.flush().await?;
        Ok(self.stats.clone())
    }

    pub fn stats(&self) -> &ArchiveStats {
        &self.stats
    }

    /// Recover the sink. Call [`Encoder::flush`] first.
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }

    fn record_failure(&mut self, report: &mut EncodeReport, path: PathBuf, error: ArchiveError) {
        tracing::warn!("cannot encode: {}", error);
        self.stats.failed += 1;
        report.failures.push(EntryFailure { path, error });
    }

    /// Write `message_buf` as one frame.
    async fn emit(&mut self, tag: MessageType) -> Result<()> {
        write_frame(&mut self.sink, tag, &self.message_buf).await?;
        self.frames += 1;
        Ok(())
    }

    fn encode_entry<'a>(
        &'a mut self,
        path: &'a Path,
        name: OsString,
        kind: EntryKind,
        report: &'a mut EncodeReport,
    ) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            match kind {
                EntryKind::RegularFile => self.encode_file(path, name).await,
                EntryKind::Directory => self.encode_directory(path, name, report).await,
                EntryKind::Symlink => self.encode_symlink(path, name).await,
                EntryKind::Fifo => self.encode_special(path, name, MessageType::Fifo).await,
                EntryKind::Socket => self.encode_special(path, name, MessageType::Socket).await,
                EntryKind::Device | EntryKind::Other => Err(ArchiveError::Unsupported {
                    path: path.to_path_buf(),
                    kind: kind.as_str(),
                }),
            }
        }
        .boxed_local()
    }

    async fn encode_file(&mut self, path: &Path, name: OsString) -> Result<()> {
        tracing::debug!("{} encode file", path.display());

        let mut file = File::open(path)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        let size = meta.len();

        self.file_buf.clear();
        self.file_buf.reserve(size as usize);
        let read = file
            .read_to_end(&mut self.file_buf)
            .await
            .map_err(|e| ArchiveError::io(path, e))? as u64;
        if read < size {
            return Err(ArchiveError::Truncated {
                what: "file content",
                needed: size,
                available: read,
            });
        }

        let header = RegularFile {
            name,
            mtime: mtime_of(&meta),
            mode: mode_of(&meta),
            content_hash: hash(&self.file_buf),
            size: read,
        };
        tracing::debug!(
            "{} mtime: {} mode: {:o} hash: {:016x} size: {}",
            path.display(),
            header.mtime,
            header.mode,
            header.content_hash,
            header.size
        );

        self.message_buf.clear();
        header.encode_into(&mut self.message_buf, &self.file_buf);
        self.emit(MessageType::RegularFile).await?;

        self.stats.files += 1;
        self.stats.bytes += read;
        Ok(())
    }

    /// Encode a directory and its children. Failing to stat or list the
    /// directory emits nothing; a child failure is recorded and the walk
    /// moves on to the next sibling.
    async fn encode_directory(
        &mut self,
        path: &Path,
        name: OsString,
        report: &mut EncodeReport,
    ) -> Result<()> {
        tracing::debug!("{} encode directory", path.display());

        let meta = fs::metadata(path)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        // Captured before the children are visited; sent after them.
        let mtime = mtime_of(&meta);
        let children = list_children(path, self.config.sort_children).await?;

        self.message_buf.clear();
        DirectoryDescend {
            name,
            mode: mode_of(&meta),
        }
        .encode_into(&mut self.message_buf);
        self.emit(MessageType::DirectoryDescend).await?;
        self.stats.dirs += 1;

        for child in children {
            self.encode_child(path, child, report).await?;
        }

        // No recovery from here: the decoder is one level deeper than we are.
        self.message_buf.clear();
        DirectoryAscend { mtime }.encode_into(&mut self.message_buf);
        self.emit(MessageType::DirectoryAscend).await
    }

    /// Encode one listed child. Only fatal errors are returned; anything
    /// else is recorded and the caller moves on to the next sibling.
    async fn encode_child(
        &mut self,
        dir: &Path,
        child: ChildEntry,
        report: &mut EncodeReport,
    ) -> Result<()> {
        let child_path = dir.join(&child.name);
        let result = match child.kind {
            Ok(kind) => {
                self.encode_entry(&child_path, child.name, kind, report)
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.record_failure(report, child_path, e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn encode_symlink(&mut self, path: &Path, name: OsString) -> Result<()> {
        tracing::debug!("{} encode symlink", path.display());

        let meta = fs::symlink_metadata(path)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        let referent = fs::read_link(path)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        tracing::debug!("{} referent: {}", path.display(), referent.display());

        self.message_buf.clear();
        Symlink {
            name,
            referent,
            mtime: mtime_of(&meta),
            mode: mode_of(&meta),
        }
        .encode_into(&mut self.message_buf);
        self.emit(MessageType::Symlink).await?;

        self.stats.symlinks += 1;
        Ok(())
    }

    async fn encode_special(&mut self, path: &Path, name: OsString, tag: MessageType) -> Result<()> {
        tracing::debug!("{} encode {:?}", path.display(), tag);

        let meta = fs::symlink_metadata(path)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;

        self.message_buf.clear();
        SpecialFile {
            name,
            mtime: mtime_of(&meta),
            mode: mode_of(&meta),
        }
        .encode_into(&mut self.message_buf);
        self.emit(tag).await?;

        if tag == MessageType::Fifo {
            self.stats.fifos += 1;
        } else {
            self.stats.sockets += 1;
        }
        Ok(())
    }
}
