//! `ZipWriter`: appends entries to an archive and finalizes the central
//! directory + EOCD on close (spec §4.5 "Writer algorithm", §6).
//!
//! Entries are compressed as a complete in-memory buffer (the from-scratch
//! `deflate` encoder operates that way, see its module doc), so by the time
//! any byte of an entry reaches the sink its CRC and final sizes are already
//! known. The local-header-vs-data-descriptor choice is still driven purely
//! by whether the sink can seek, matching spec §4.6's backend taxonomy,
//! rather than by what we happen to know -- a pipe sink always gets a
//! trailing data descriptor, a seekable one always gets an in-place patch.

use crate::container::{
    self, CentralDirectoryHeader, DataDescriptor, Entry, Eocd, LocalHeader, Method,
    DOS_ATTR_DIRECTORY, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED,
};
use crate::crc32::crc32;
use crate::crypto::{ZipCrypto, HEADER_LEN};
use crate::deflate;
use crate::dostime::DosDateTime;
use crate::error::{Result, ZipError};
use crate::io_adaptor::{FileBackend, MemoryBackend, PipeBackend, Sink};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Target zlib-style compression level. `0` forces STORE for every entry
/// (no DEFLATE attempted, matching common archivers' `-0` flag); `1..=9`
/// all currently dispatch to the same from-scratch encoder (spec §4.3: "the
/// default path targets zlib level 6" -- this crate implements that single
/// tuning point rather than zlib's full level/strategy matrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const STORE_ONLY: CompressionLevel = CompressionLevel(0);
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    pub fn new(level: u8) -> CompressionLevel {
        CompressionLevel(level.min(9))
    }
}

/// Appends entries to an archive over any [`Sink`] backend.
pub struct ZipWriter<S: Sink> {
    sink: S,
    entries: Vec<Entry>,
    level: CompressionLevel,
    password: Option<Vec<u8>>,
    finished: bool,
}

impl ZipWriter<FileBackend> {
    /// Opens (creating/truncating) a file-backed archive for writing.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path).map_err(ZipError::IoWrite)?;
        Ok(Self::from_sink(FileBackend::new(file)))
    }

    pub fn with_compression<P: AsRef<Path>>(path: P, level: u8) -> Result<Self> {
        let mut w = Self::new(path)?;
        w.level = CompressionLevel::new(level);
        Ok(w)
    }
}

impl ZipWriter<MemoryBackend> {
    /// An unbounded growable in-memory archive (spec §6 `get_memory`).
    pub fn new_in_memory() -> Self {
        Self::from_sink(MemoryBackend::new())
    }

    /// An in-memory archive that refuses to grow past `cap` bytes (spec §4.6
    /// "the writer mode of 'in-memory archive with upper-bound len' refuses
    /// to grow past len with WRITE"; spec §8 S4).
    pub fn new_in_memory_capped(cap: usize) -> Self {
        Self::from_sink(MemoryBackend::with_capacity_cap(cap))
    }

    /// Finalizes the archive and returns its bytes (spec §6 `get_memory`:
    /// "implies no further writes").
    pub fn into_memory(mut self) -> Result<Vec<u8>> {
        self.finalize()?;
        Ok(self.sink.into_vec())
    }
}

impl<W: Write> ZipWriter<PipeBackend<W>> {
    /// Wraps a unidirectional, non-seekable sink (spec §4.6 "Pipe"). Every
    /// entry written through this writer gets a trailing data descriptor;
    /// sizes cannot be back-patched.
    pub fn from_pipe(inner: W) -> Self {
        Self::from_sink(PipeBackend::new(inner))
    }
}

impl<S: Sink> ZipWriter<S> {
    fn from_sink(sink: S) -> Self {
        Self {
            sink,
            entries: Vec::new(),
            level: CompressionLevel::DEFAULT,
            password: None,
            finished: false,
        }
    }

    pub fn set_compression_level(&mut self, level: u8) {
        self.level = CompressionLevel::new(level);
    }

    /// Encrypts every subsequently added entry with the PKWARE traditional
    /// cipher (spec §4.3). Preserved only for compatibility with legacy
    /// unzippers; it is cryptographically weak.
    pub fn set_password(&mut self, password: impl Into<Vec<u8>>) {
        self.password = Some(password.into());
    }

    /// Adds a complete in-memory entry (spec §6 `add(handle, name, bytes)`),
    /// timestamped with the current time.
    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let now = unix_now();
        self.add_entry_with_time(name, data, now)
    }

    pub fn add_entry_with_time(&mut self, name: &str, data: &[u8], unix_time: i64) -> Result<()> {
        if name.is_empty() {
            return Err(ZipError::Args("entry name must not be empty".to_string()));
        }
        let dt = DosDateTime::from_unix_timestamp(unix_time);
        let (dos_date, dos_time) = dt.to_dos_fields();
        self.write_entry(name, data, dos_time, dos_date, 0)
    }

    /// Reads a file from disk and adds it, using the file's modification
    /// time (spec §6 `add(handle, name, file-path)`).
    pub fn add_file<P: AsRef<Path>>(&mut self, name: &str, path: P) -> Result<()> {
        let mut file = File::open(path.as_ref()).map_err(ZipError::IoRead)?;
        let mtime = file
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or_else(unix_now);
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(ZipError::IoRead)?;
        self.add_entry_with_time(name, &data, mtime)
    }

    /// Drains `reader` fully and adds its bytes. If `declared_len` is
    /// supplied and doesn't match the number of bytes actually read, returns
    /// `SizeMismatch` (spec §6 `add(..., declared_len?)`, §7).
    pub fn add_reader<R: Read>(
        &mut self,
        name: &str,
        mut reader: R,
        declared_len: Option<u64>,
    ) -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(ZipError::IoRead)?;
        if let Some(declared) = declared_len {
            if declared != data.len() as u64 {
                return Err(ZipError::SizeMismatch);
            }
        }
        self.add_entry(name, &data)
    }

    /// Emits a directory marker entry (spec §6 `add_folder`, §3 directory
    /// invariants: zero size, STORE, name ends in `/`, directory attribute
    /// bit set).
    pub fn add_folder(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(ZipError::Args("folder name must not be empty".to_string()));
        }
        let normalized = container::normalize_name_for_write(name);
        let stored_name = if normalized.ends_with('/') {
            normalized
        } else {
            format!("{normalized}/")
        };
        let now = unix_now();
        let dt = DosDateTime::from_unix_timestamp(now);
        let (dos_date, dos_time) = dt.to_dos_fields();

        let local_header_offset = self.sink.tell()?;
        let header = LocalHeader::encode(
            &stored_name,
            Method::Store,
            0,
            dos_time,
            dos_date,
            0,
            0,
            0,
            &[],
        );
        self.sink.write_all(&header)?;

        self.entries.push(Entry {
            index: self.entries.len(),
            name: stored_name,
            uncompressed_size: 0,
            compressed_size: 0,
            crc32: 0,
            method: Method::Store,
            flags: 0,
            dos_time,
            dos_date,
            external_attr: DOS_ATTR_DIRECTORY,
            local_header_offset,
            extra_field: Vec::new(),
            comment: String::new(),
            mtime: Some(now),
            atime: None,
            ctime: None,
        });
        Ok(())
    }

    /// Compresses and emits one complete entry. Because the encoder works
    /// over a fully-buffered member (see module doc), the final method, CRC
    /// and sizes are all known before the first byte reaches the sink --
    /// the only thing driven by the sink's backend is whether the local
    /// header can then be patched in place or must defer to a trailing data
    /// descriptor (spec §4.5/§4.6).
    fn write_entry(
        &mut self,
        name: &str,
        data: &[u8],
        dos_time: u16,
        dos_date: u16,
        external_attr: u32,
    ) -> Result<()> {
        let stored_name = container::normalize_name_for_write(name);
        let crc = crc32(data);

        let method = if self.level == CompressionLevel::STORE_ONLY {
            Method::Store
        } else {
            Method::Deflate
        };
        let mut payload = match method {
            Method::Store => data.to_vec(),
            Method::Deflate => deflate::compress(data),
        };
        // STORE wins if DEFLATE didn't actually shrink the data.
        let method = if method == Method::Deflate && payload.len() >= data.len() {
            payload = data.to_vec();
            Method::Store
        } else {
            method
        };

        let seekable = self.sink.can_seek();
        let mut flags = if self.password.is_some() { FLAG_ENCRYPTED } else { 0 }
            | if seekable { 0 } else { FLAG_DATA_DESCRIPTOR };

        if let Some(password) = &self.password {
            let validator = if seekable {
                (crc >> 24) as u8
            } else {
                (dos_time >> 8) as u8
            };
            let mut header = random_header_bytes();
            header[11] = validator;
            let mut cipher = ZipCrypto::from_password(password);
            cipher.encrypt(&mut header);
            cipher.encrypt(&mut payload);
            let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
            framed.extend_from_slice(&header);
            framed.extend_from_slice(&payload);
            payload = framed;
            flags |= FLAG_ENCRYPTED;
        }

        let compressed_size = payload.len() as u64;
        let uncompressed_size = data.len() as u64;

        let local_header_offset = self.sink.tell()?;
        let header_sizes = if seekable {
            (crc, compressed_size as u32, uncompressed_size as u32)
        } else {
            (0, 0, 0)
        };
        let header = LocalHeader::encode(
            &stored_name,
            method,
            flags,
            dos_time,
            dos_date,
            header_sizes.0,
            header_sizes.1,
            header_sizes.2,
            &[],
        );
        self.sink.write_all(&header)?;
        self.sink.write_all(&payload)?;

        if !seekable {
            let descriptor = DataDescriptor {
                crc32: crc,
                compressed_size: compressed_size as u32,
                uncompressed_size: uncompressed_size as u32,
            };
            self.sink.write_all(&descriptor.encode())?;
        }

        self.entries.push(Entry {
            index: self.entries.len(),
            name: stored_name,
            uncompressed_size,
            compressed_size,
            crc32: crc,
            method,
            flags,
            dos_time,
            dos_date,
            external_attr,
            local_header_offset,
            extra_field: Vec::new(),
            comment: String::new(),
            mtime: None,
            atime: None,
            ctime: None,
        });
        Ok(())
    }

    /// Number of entries written so far (spec §6 `enumerate`, pre-close).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finished {
            return Err(ZipError::Ended);
        }

        let cd_offset = self.sink.tell()?;
        for entry in &self.entries {
            let header = CentralDirectoryHeader::encode(entry, &entry.name, &entry.comment);
            self.sink.write_all(&header)?;
        }
        let cd_end = self.sink.tell()?;
        let cd_size = (cd_end - cd_offset) as u32;

        let eocd = Eocd {
            cd_entries_this_disk: self.entries.len() as u16,
            cd_entries_total: self.entries.len() as u16,
            cd_size,
            cd_offset: cd_offset as u32,
        };
        self.sink.write_all(&eocd.encode(&[]))?;
        self.finished = true;
        Ok(())
    }

    /// Finalizes the archive: emits the central directory and EOCD (spec §6
    /// `close`).
    pub fn finish(mut self) -> Result<()> {
        self.finalize()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn random_header_bytes() -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    if getrandom::getrandom(&mut buf).is_err() {
        // Fallback keeps the writer operational even if the platform RNG is
        // unavailable; the traditional cipher's security margin is already
        // negligible (spec §9), so a time-seeded xorshift is an acceptable
        // last resort rather than failing the whole entry.
        let mut seed = unix_now() as u64 ^ 0x9E37_79B9_7F4A_7C15;
        for b in buf.iter_mut() {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            *b = (seed & 0xFF) as u8;
        }
    }
    buf
}
