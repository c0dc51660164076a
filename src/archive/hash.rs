//! Content hashing for transmission integrity.
//!
//! xxHash64 with seed 0. Guards against corruption in transit, not against a
//! malicious producer.

use std::io::{self, Write};
use xxhash_rust::xxh64::{xxh64, Xxh64};

const SEED: u64 = 0;

/// Hash a complete buffer.
pub fn hash(bytes: &[u8]) -> u64 {
    xxh64(bytes, SEED)
}

/// Incremental form of [`hash`].
pub struct ContentHasher {
    inner: Xxh64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: Xxh64::new(SEED),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finish(&self) -> u64 {
        self.inner.digest()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Tee that hashes every byte on its way into `inner`.
pub struct HashingWriter<W> {
    inner: W,
    hasher: ContentHasher,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: ContentHasher::new(),
        }
    }

    /// Hash of the bytes accepted by `inner` so far.
    pub fn digest(&self) -> u64 {
        self.hasher.finish()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
