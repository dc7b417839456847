//! PKWARE .ZIP container framing (spec §4.5): local file header, central
//! directory header, end-of-central-directory record, and the optional data
//! descriptor trailer. Field layout is bit-exact with APPNOTE v2.0; this
//! module only encodes/decodes bytes, it does not drive I/O -- that is
//! `reader`/`writer`'s job via [`crate::io_adaptor`].

use crate::dostime::{DosDateTime, ExtendedTimestamp, EXTENDED_TIMESTAMP_TAG};
use crate::error::{Result, ZipError};

pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

/// Version-needed-to-extract written by this implementation: DEFLATE plus
/// traditional encryption both only require 2.0.
pub const VERSION_NEEDED: u16 = 20;
/// Version-made-by: upper byte 0 (MS-DOS host), matching the source
/// library's choice to always target the most portable value.
pub const VERSION_MADE_BY: u16 = 20;

/// Bit 0 of the general-purpose flag field: entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// Bit 3: sizes/CRC are zero in the local header and follow in a trailing
/// data descriptor instead.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// MS-DOS directory attribute bit within `external_attr`'s low byte.
pub const DOS_ATTR_DIRECTORY: u32 = 0x10;

/// Compression method (spec §3: only these two are in scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Store,
    Deflate,
}

impl Method {
    pub fn to_u16(self) -> u16 {
        match self {
            Method::Store => 0,
            Method::Deflate => 8,
        }
    }

    pub fn from_u16(v: u16) -> Result<Method> {
        match v {
            0 => Ok(Method::Store),
            8 => Ok(Method::Deflate),
            other => Err(ZipError::Corrupt(format!(
                "unsupported compression method {other}"
            ))),
        }
    }
}

/// A logical archive entry (spec §3 "Entry"). Shared between `ZipWriter`
/// (building one as it writes) and `ZipReader` (populating one per central
/// directory record parsed).
#[derive(Debug, Clone)]
pub struct Entry {
    /// Position of this entry within the archive (0-based), mirroring
    /// XUnzip's `ZIPENTRY::index`.
    pub index: usize,
    pub name: String,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub method: Method,
    pub flags: u16,
    pub dos_time: u16,
    pub dos_date: u16,
    pub external_attr: u32,
    pub local_header_offset: u64,
    pub extra_field: Vec<u8>,
    pub comment: String,
    /// Recovered from the extended-timestamp extra field (tag 0x5455) when
    /// present, as Unix epoch seconds; `None` if absent (spec §3, §8 S6).
    pub mtime: Option<i64>,
    pub atime: Option<i64>,
    pub ctime: Option<i64>,
}

impl Entry {
    /// Directory entries are marked by the MS-DOS directory attribute bit
    /// and, per spec §3, always end in `/` with zero size and STORE method.
    pub fn is_directory(&self) -> bool {
        self.external_attr & DOS_ATTR_DIRECTORY != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Parses the extended-timestamp extra field (0x5455), if present, into
    /// `self.mtime`/`atime`/`ctime`.
    pub fn populate_extended_timestamp(&mut self) {
        let mut i = 0usize;
        while i + 4 <= self.extra_field.len() {
            let tag = u16::from_le_bytes([self.extra_field[i], self.extra_field[i + 1]]);
            let len = u16::from_le_bytes([self.extra_field[i + 2], self.extra_field[i + 3]]) as usize;
            let body_start = i + 4;
            if body_start + len > self.extra_field.len() {
                break;
            }
            if tag == EXTENDED_TIMESTAMP_TAG {
                if let Some(ts) = ExtendedTimestamp::decode(&self.extra_field[body_start..body_start + len]) {
                    self.mtime = ts.mtime;
                    self.atime = ts.atime;
                    self.ctime = ts.ctime;
                }
                return;
            }
            i = body_start + len;
        }
    }
}

/// Decoded fixed-size portion of a local file header (spec §4.5); name and
/// extra field are read separately by the caller since their lengths come
/// from this struct.
#[derive(Debug, Clone)]
pub struct LocalHeader {
    pub flags: u16,
    pub method: Method,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalHeader {
    pub const FIXED_LEN: usize = 30;

    pub fn parse(buf: &[u8; Self::FIXED_LEN]) -> Result<LocalHeader> {
        let sig = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if sig != LOCAL_HEADER_SIGNATURE {
            return Err(ZipError::Corrupt(format!(
                "bad local file header signature 0x{sig:08x}"
            )));
        }
        let flags = u16::from_le_bytes(buf[6..8].try_into().unwrap());
        let method = Method::from_u16(u16::from_le_bytes(buf[8..10].try_into().unwrap()))?;
        let dos_time = u16::from_le_bytes(buf[10..12].try_into().unwrap());
        let dos_date = u16::from_le_bytes(buf[12..14].try_into().unwrap());
        let crc32 = u32::from_le_bytes(buf[14..18].try_into().unwrap());
        let compressed_size = u32::from_le_bytes(buf[18..22].try_into().unwrap());
        let uncompressed_size = u32::from_le_bytes(buf[22..26].try_into().unwrap());
        let name_len = u16::from_le_bytes(buf[26..28].try_into().unwrap());
        let extra_len = u16::from_le_bytes(buf[28..30].try_into().unwrap());
        Ok(LocalHeader {
            flags,
            method,
            dos_time,
            dos_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name_len,
            extra_len,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        name: &str,
        method: Method,
        flags: u16,
        dos_time: u16,
        dos_date: u16,
        crc32: u32,
        compressed_size: u32,
        uncompressed_size: u32,
        extra: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::FIXED_LEN + name.len() + extra.len());
        out.extend_from_slice(&LOCAL_HEADER_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&method.to_u16().to_le_bytes());
        out.extend_from_slice(&dos_time.to_le_bytes());
        out.extend_from_slice(&dos_date.to_le_bytes());
        out.extend_from_slice(&crc32.to_le_bytes());
        out.extend_from_slice(&compressed_size.to_le_bytes());
        out.extend_from_slice(&uncompressed_size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(extra);
        out
    }
}

/// Decoded 12-byte data descriptor body (the 4-byte signature is optional
/// per APPNOTE and peeked-for separately by the caller).
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const LEN: usize = 12;

    pub fn encode(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + Self::LEN);
        out.extend_from_slice(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&self.crc32.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out
    }

    pub fn parse(buf: &[u8; Self::LEN]) -> DataDescriptor {
        DataDescriptor {
            crc32: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            compressed_size: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            uncompressed_size: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
        }
    }
}

/// Decoded fixed-size portion of a central directory header (spec §4.5).
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub flags: u16,
    pub method: Method,
    pub dos_time: u16,
    pub dos_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
    pub comment_len: u16,
    pub internal_attr: u16,
    pub external_attr: u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    pub const FIXED_LEN: usize = 46;

    pub fn parse(buf: &[u8; Self::FIXED_LEN]) -> Result<CentralDirectoryHeader> {
        let sig = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if sig != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(ZipError::Corrupt(format!(
                "bad central directory header signature 0x{sig:08x}"
            )));
        }
        let flags = u16::from_le_bytes(buf[8..10].try_into().unwrap());
        let method = Method::from_u16(u16::from_le_bytes(buf[10..12].try_into().unwrap()))?;
        let dos_time = u16::from_le_bytes(buf[12..14].try_into().unwrap());
        let dos_date = u16::from_le_bytes(buf[14..16].try_into().unwrap());
        let crc32 = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        let compressed_size = u32::from_le_bytes(buf[20..24].try_into().unwrap());
        let uncompressed_size = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        let name_len = u16::from_le_bytes(buf[28..30].try_into().unwrap());
        let extra_len = u16::from_le_bytes(buf[30..32].try_into().unwrap());
        let comment_len = u16::from_le_bytes(buf[32..34].try_into().unwrap());
        let internal_attr = u16::from_le_bytes(buf[36..38].try_into().unwrap());
        let external_attr = u32::from_le_bytes(buf[38..42].try_into().unwrap());
        let local_header_offset = u32::from_le_bytes(buf[42..46].try_into().unwrap());
        Ok(CentralDirectoryHeader {
            flags,
            method,
            dos_time,
            dos_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name_len,
            extra_len,
            comment_len,
            internal_attr,
            external_attr,
            local_header_offset,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode(entry: &Entry, name: &str, comment: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::FIXED_LEN + name.len() + entry.extra_field.len() + comment.len());
        out.extend_from_slice(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
        out.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        out.extend_from_slice(&entry.flags.to_le_bytes());
        out.extend_from_slice(&entry.method.to_u16().to_le_bytes());
        out.extend_from_slice(&entry.dos_time.to_le_bytes());
        out.extend_from_slice(&entry.dos_date.to_le_bytes());
        out.extend_from_slice(&entry.crc32.to_le_bytes());
        out.extend_from_slice(&(entry.compressed_size as u32).to_le_bytes());
        out.extend_from_slice(&(entry.uncompressed_size as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(entry.extra_field.len() as u16).to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // disk_number_start
        out.extend_from_slice(&0u16.to_le_bytes()); // internal_attr
        out.extend_from_slice(&entry.external_attr.to_le_bytes());
        out.extend_from_slice(&(entry.local_header_offset as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&entry.extra_field);
        out.extend_from_slice(comment.as_bytes());
        out
    }
}

/// End-of-central-directory record (spec §4.5).
#[derive(Debug, Clone, Copy)]
pub struct Eocd {
    pub cd_entries_this_disk: u16,
    pub cd_entries_total: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl Eocd {
    pub const FIXED_LEN: usize = 22;

    pub fn encode(self, comment: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::FIXED_LEN + comment.len());
        out.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // this_disk
        out.extend_from_slice(&0u16.to_le_bytes()); // cd_start_disk
        out.extend_from_slice(&self.cd_entries_this_disk.to_le_bytes());
        out.extend_from_slice(&self.cd_entries_total.to_le_bytes());
        out.extend_from_slice(&self.cd_size.to_le_bytes());
        out.extend_from_slice(&self.cd_offset.to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(comment);
        out
    }

    pub fn parse(buf: &[u8; Self::FIXED_LEN]) -> Result<Eocd> {
        let sig = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if sig != EOCD_SIGNATURE {
            return Err(ZipError::Corrupt(format!("bad EOCD signature 0x{sig:08x}")));
        }
        Ok(Eocd {
            cd_entries_this_disk: u16::from_le_bytes(buf[8..10].try_into().unwrap()),
            cd_entries_total: u16::from_le_bytes(buf[10..12].try_into().unwrap()),
            cd_size: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            cd_offset: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        })
    }

    /// Scans `tail` (the last up-to-65557 bytes of the archive) backward for
    /// the EOCD signature, per spec §4.5's reader algorithm. Returns the
    /// byte offset of the signature within `tail`.
    pub fn find_in_tail(tail: &[u8]) -> Result<usize> {
        if tail.len() < Self::FIXED_LEN {
            return Err(ZipError::Corrupt("archive too short for EOCD".to_string()));
        }
        let sig = EOCD_SIGNATURE.to_le_bytes();
        let mut i = tail.len() - Self::FIXED_LEN;
        loop {
            if tail[i..i + 4] == sig {
                return Ok(i);
            }
            if i == 0 {
                break;
            }
            i -= 1;
        }
        Err(ZipError::Corrupt(
            "end of central directory record not found".to_string(),
        ))
    }
}

/// Normalizes backslashes to forward slashes on write, per spec §3 ("the
/// codec preserves bytes verbatim, only normalizing backslashes to forward
/// slashes on write").
pub fn normalize_name_for_write(name: &str) -> String {
    name.replace('\\', "/")
}

/// ASCII-only case fold for `find(..., ignore_case=true)` lookups (spec
/// §4.5: "folds ASCII A-Z only; non-ASCII bytes compare byte-exact").
pub fn ascii_fold_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

/// Packs a `DosDateTime` into `(date, time)` header fields.
pub fn pack_dos(dt: DosDateTime) -> (u16, u16) {
    dt.to_dos_fields()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_header_round_trips_fixed_fields() {
        let encoded = LocalHeader::encode(
            "hello.txt",
            Method::Store,
            0,
            0x6000,
            0x4321,
            0xDEADBEEF,
            6,
            6,
            &[],
        );
        let fixed: [u8; LocalHeader::FIXED_LEN] = encoded[..LocalHeader::FIXED_LEN].try_into().unwrap();
        let parsed = LocalHeader::parse(&fixed).unwrap();
        assert_eq!(parsed.method, Method::Store);
        assert_eq!(parsed.crc32, 0xDEADBEEF);
        assert_eq!(parsed.compressed_size, 6);
        assert_eq!(parsed.name_len, "hello.txt".len() as u16);
    }

    #[test]
    fn eocd_scan_finds_signature_at_tail_start() {
        let eocd = Eocd {
            cd_entries_this_disk: 1,
            cd_entries_total: 1,
            cd_size: 50,
            cd_offset: 0,
        }
        .encode(&[]);
        let at = Eocd::find_in_tail(&eocd).unwrap();
        assert_eq!(at, 0);
    }

    #[test]
    fn eocd_scan_finds_signature_preceded_by_junk() {
        let mut tail = vec![0xAAu8; 10];
        tail.extend(
            Eocd {
                cd_entries_this_disk: 0,
                cd_entries_total: 0,
                cd_size: 0,
                cd_offset: 0,
            }
            .encode(&[]),
        );
        let at = Eocd::find_in_tail(&tail).unwrap();
        assert_eq!(at, 10);
    }

    #[test]
    fn ascii_fold_matches_case_insensitively_ascii_only() {
        assert!(ascii_fold_eq("Hello.TXT", "hello.txt"));
        assert!(!ascii_fold_eq("straße", "STRASSE"));
    }

    #[test]
    fn backslashes_normalize_to_forward_slashes() {
        assert_eq!(normalize_name_for_write("a\\b\\c.txt"), "a/b/c.txt");
    }
}
