//! Source/sink abstraction over file, memory, and pipe backends (spec §4.6).
//!
//! `container`/`reader`/`writer` never touch `std::fs` or `Vec<u8>` directly;
//! they go through [`Source`]/[`Sink`], which is what lets the writer decide
//! at runtime whether a size field can be back-patched (seekable backend) or
//! must be deferred to a trailing data descriptor (pipe).

use crate::error::{Result, ZipError};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A byte sink: something entries' compressed bytes, headers, and the
/// central directory are written to.
pub trait Sink {
    /// Writes `buf` in full. Short writes are only a library-internal
    /// implementation detail of the in-memory backend; callers always expect
    /// writes to either fully succeed or return `IoWrite`/`MemTooSmall`.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Whether `seek`/`tell` are meaningful for this backend. Pipes answer
    /// `false`; the writer uses this to decide between back-patching sizes
    /// in place and emitting a data descriptor (flag bit 3).
    fn can_seek(&self) -> bool;

    /// Current write position, if the backend supports it.
    fn tell(&mut self) -> Result<u64>;

    /// Seeks to an absolute offset for back-patching previously written
    /// fields. Backends that answer `can_seek() == false` return `IoSeek`.
    fn seek(&mut self, offset: u64) -> Result<()>;
}

/// A byte source: something local headers, the central directory, and
/// compressed entry payloads are read from.
pub trait Source {
    /// Reads up to `buf.len()` bytes, returning the count actually read (0
    /// at end of stream), mirroring `std::io::Read::read`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Whether `seek`/`tell`/`len` are meaningful. A pipe source answers
    /// `false`: entries may only be extracted in the order they appear.
    fn can_seek(&self) -> bool;

    /// Total length of the underlying data, if known up front (required to
    /// locate the EOCD by scanning backward from the end).
    fn len(&mut self) -> Result<u64>;

    /// Seeks to an absolute offset. Backends that answer `can_seek() ==
    /// false` return `IoSeek`.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current read position.
    fn tell(&mut self) -> Result<u64>;
}

/// File-backed sink/source: supports seek; underlying I/O errors map to
/// `IoWrite`/`IoRead`/`IoSeek` per spec §4.6.
pub struct FileBackend {
    file: File,
}

impl FileBackend {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl Sink for FileBackend {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf).map_err(ZipError::IoWrite)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn tell(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(ZipError::IoSeek)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(ZipError::IoSeek)
    }
}

impl Source for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        read_fully_or_partial(&mut self.file, buf)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn len(&mut self) -> Result<u64> {
        let cur = self.file.stream_position().map_err(ZipError::IoSeek)?;
        let end = self.file.seek(SeekFrom::End(0)).map_err(ZipError::IoSeek)?;
        self.file
            .seek(SeekFrom::Start(cur))
            .map_err(ZipError::IoSeek)?;
        Ok(end)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(ZipError::IoSeek)
    }

    fn tell(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(ZipError::IoSeek)
    }
}

fn read_fully_or_partial(r: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    match r.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
        Err(e) => Err(ZipError::IoRead(e)),
    }
}

/// An owned in-memory buffer, used both as a writer sink (growing, or capped
/// at a fixed `len` per spec §4.6's "in-memory archive with upper-bound
/// len") and as a reader source over bytes already in RAM.
pub struct MemoryBackend {
    buf: Vec<u8>,
    pos: usize,
    /// `Some(n)` caps the sink at `n` bytes; writes beyond it fail with
    /// `MemTooSmall` rather than growing. `None` means unbounded (the
    /// common in-memory-writer case).
    cap: Option<usize>,
}

impl MemoryBackend {
    /// An empty, unbounded growable buffer (writer use).
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            cap: None,
        }
    }

    /// An empty buffer that refuses to grow past `cap` bytes.
    pub fn with_capacity_cap(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            cap: Some(cap),
        }
    }

    /// Wraps already-populated bytes for reading.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self {
            buf,
            pos: 0,
            cap: None,
        }
    }

    /// Consumes the backend, returning the owned bytes (spec §6
    /// `get_memory`).
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemoryBackend {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        if let Some(cap) = self.cap {
            if end > cap {
                return Err(ZipError::MemTooSmall);
            }
        }
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset as usize;
        Ok(())
    }
}

impl Source for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.buf.len().saturating_sub(self.pos);
        let n = avail.min(buf.len());
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.buf.len() as u64)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset as usize;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }
}

/// A unidirectional, non-seekable backend wrapping any `Read`/`Write`
/// implementor (an OS pipe, a socket, a `Stdin`/`Stdout` handle). Per spec
/// §4.6: no seek; the writer must defer sizes to a data descriptor, and the
/// reader can only visit entries in stream order.
pub struct PipeBackend<T> {
    inner: T,
    pos: u64,
}

impl<T> PipeBackend<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, pos: 0 }
    }
}

impl<T: Write> Sink for PipeBackend<T> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf).map_err(ZipError::IoWrite)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos)
    }

    fn seek(&mut self, _offset: u64) -> Result<()> {
        Err(ZipError::IoSeek(io::Error::new(
            io::ErrorKind::Unsupported,
            "pipe sink does not support seek",
        )))
    }
}

impl<T: Read> Source for PipeBackend<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = read_fully_or_partial(&mut self.inner, buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn len(&mut self) -> Result<u64> {
        Err(ZipError::IoSeek(io::Error::new(
            io::ErrorKind::Unsupported,
            "pipe source has no known length",
        )))
    }

    fn seek(&mut self, _offset: u64) -> Result<()> {
        Err(ZipError::IoSeek(io::Error::new(
            io::ErrorKind::Unsupported,
            "pipe source does not support seek",
        )))
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_round_trips_write_then_read() {
        let mut sink = MemoryBackend::new();
        sink.write_all(b"hello").unwrap();
        sink.write_all(b" world").unwrap();
        let bytes = sink.into_vec();
        assert_eq!(&bytes, b"hello world");

        let mut source = MemoryBackend::from_vec(bytes);
        let mut buf = [0u8; 5];
        assert_eq!(source.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn memory_backend_with_cap_refuses_overflow() {
        let mut sink = MemoryBackend::with_capacity_cap(4);
        assert!(sink.write_all(b"1234").is_ok());
        assert!(sink.write_all(b"5").is_err());
    }

    #[test]
    fn pipe_backend_rejects_seek() {
        let data = b"abc".to_vec();
        let mut source = PipeBackend::new(&data[..]);
        assert!(!source.can_seek());
        assert!(source.seek(0).is_err());
        let mut buf = [0u8; 3];
        assert_eq!(source.read(&mut buf).unwrap(), 3);
    }

    #[test]
    fn memory_backend_seek_repositions_write_cursor() {
        let mut sink = MemoryBackend::new();
        sink.write_all(b"aaaa").unwrap();
        sink.seek(1).unwrap();
        sink.write_all(b"bb").unwrap();
        assert_eq!(sink.into_vec(), b"abba");
    }
}
