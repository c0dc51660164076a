//! Frame reading/writing.
//!
//! Frame format: `type: u32 BE | len: uvarint | payload`.
//! There is no stream header or trailer; a clean end of input before a frame
//! begins is the end of the stream.

use crate::archive::protocol::MessageType;
use crate::archive::scalar::{decode_uvarint, put_uvarint, MAX_UVARINT_LEN};
use crate::error::{ArchiveError, Result};
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default maximum frame size (4GB) - guards allocation against corrupt lengths
pub const DEFAULT_MAX_FRAME_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Header written in front of every payload.
fn encode_header(tag: MessageType, payload_len: usize) -> ([u8; 4 + MAX_UVARINT_LEN], usize) {
    let mut header = [0u8; 4 + MAX_UVARINT_LEN];
    header[..4].copy_from_slice(&tag.as_u32().to_be_bytes());
    let mut len = Vec::with_capacity(MAX_UVARINT_LEN);
    put_uvarint(&mut len, payload_len as u64);
    header[4..4 + len.len()].copy_from_slice(&len);
    (header, 4 + len.len())
}

/// Write one frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    tag: MessageType,
    payload: &[u8],
) -> Result<()> {
    let (header, header_len) = encode_header(tag, payload.len());
    w.write_all(&header[..header_len])
        .await
        .map_err(ArchiveError::Sink)?;
    w.write_all(payload).await.map_err(ArchiveError::Sink)?;
    Ok(())
}

fn truncated(what: &str) -> ArchiveError {
    ArchiveError::Stream(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("stream ends inside {what}"),
    ))
}

/// A frame header that cannot be parsed; the stream cannot be resynchronized.
fn corrupt_header(reason: String) -> ArchiveError {
    ArchiveError::Stream(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("corrupt frame length: {reason}"),
    ))
}

/// Fill `buf` completely; returns the number of bytes read before EOF.
async fn read_full<R: AsyncRead + Unpin>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r
            .read(&mut buf[filled..])
            .await
            .map_err(ArchiveError::Stream)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read a single frame from the stream into `payload`.
///
/// Returns the raw type tag so the caller decides what an unknown tag means,
/// or `None` at a clean end of stream.
pub async fn read_frame<R: AsyncRead + Unpin>(
    r: &mut R,
    payload: &mut BytesMut,
    max_frame_size: u64,
) -> Result<Option<u32>> {
    let mut tag = [0u8; 4];
    match read_full(r, &mut tag).await? {
        0 => return Ok(None),
        4 => {}
        _ => return Err(truncated("frame type")),
    }
    let tag = u32::from_be_bytes(tag);

    let mut len_bytes = [0u8; MAX_UVARINT_LEN];
    let mut used = 0;
    let len = loop {
        if used == MAX_UVARINT_LEN {
            return Err(corrupt_header("varint longer than 10 bytes".to_string()));
        }
        if read_full(r, &mut len_bytes[used..used + 1]).await? == 0 {
            return Err(truncated("frame length"));
        }
        used += 1;
        match decode_uvarint(&len_bytes[..used]) {
            Ok(Some((len, _))) => break len,
            Ok(None) => {}
            Err(e) => return Err(corrupt_header(e.to_string())),
        }
    };

    // Validate frame size before allocation
    if len > max_frame_size {
        return Err(ArchiveError::FrameTooLarge {
            len,
            max: max_frame_size,
        });
    }
    let len = usize::try_from(len).map_err(|_| ArchiveError::FrameTooLarge {
        len,
        max: usize::MAX as u64,
    })?;

    payload.clear();
    payload.resize(len, 0);
    let n = read_full(r, &mut payload[..]).await?;
    if n < len {
        return Err(ArchiveError::Stream(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("frame payload truncated: {n} < {len}"),
        )));
    }

    Ok(Some(tag))
}
