//! Error types for szip-core

use std::io;

/// Result type for szip-core operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// The result discriminant taxonomy (spec §6/§7).
///
/// Every public operation returns either `Ok(_)` or one of these variants; no
/// panics escape the core on malformed input. [`crate::Status::More`] is a
/// progress signal, not an error, and is kept out of this enum.
#[derive(Debug)]
pub enum ZipError {
    /// Underlying read failure.
    IoRead(io::Error),
    /// Underlying write failure.
    IoWrite(io::Error),
    /// Underlying seek failure, or seek attempted on an unseekable backend.
    IoSeek(io::Error),
    /// Allocation failed (buffer growth refused, capacity exceeded).
    Alloc,
    /// Archive or entry data is malformed: bad signature, bad Huffman code,
    /// out-of-range back-reference, LEN/NLEN mismatch, etc.
    Corrupt(String),
    /// Encryption header validation failed: wrong password.
    Password,
    /// Named entry is not present in the central directory.
    NotFound(String),
    /// Caller supplied invalid arguments (empty name, zero-length window, ...).
    Args(String),
    /// Operation attempted on a closed/finished handle.
    Ended,
    /// Attempted to mix reader and writer operations on one handle.
    MixMode,
    /// `get_memory` called on a non-memory-backed writer.
    NotMmap,
    /// In-memory sink's fixed capacity is smaller than required.
    MemTooSmall,
    /// Declared length did not match the number of bytes actually written.
    SizeMismatch,
    /// Entry extraction was resumed out of order: another entry's extraction
    /// was only partially driven to completion.
    Partial,
    /// Internal inflate/deflate invariant violated (not attributable to
    /// malformed input -- implementation bug).
    InflateInternal(String),
    /// Operation attempted before required state was initialized.
    NotInited,
}

impl ZipError {
    /// Maps each discriminant to a fixed human-readable string. Part of the
    /// stable interface (spec §7).
    pub fn message(&self) -> &'static str {
        match self {
            ZipError::IoRead(_) => "a general error reading the file",
            ZipError::IoWrite(_) => "a general error writing to the file",
            ZipError::IoSeek(_) => "seek failed or file is not seekable",
            ZipError::Alloc => "failed to allocate some resource",
            ZipError::Corrupt(_) => "the zipfile is corrupt or not a zipfile",
            ZipError::Password => "we didn't get the right password to unzip the file",
            ZipError::NotFound(_) => "couldn't find that file in the zip",
            ZipError::Args(_) => "general mistake with the arguments",
            ZipError::Ended => "the zip creation has already been closed",
            ZipError::MixMode => "tried to mix creating/opening a zip",
            ZipError::NotMmap => "tried to get memory, but this isn't a memory-backed zip",
            ZipError::MemTooSmall => "the memory size is too small",
            ZipError::SizeMismatch => "the indicated input file size turned out mistaken",
            ZipError::Partial => "the file had already been partially unzipped",
            ZipError::InflateInternal(_) => "an internal error in the de/inflation code",
            ZipError::NotInited => "initialization didn't work",
        }
    }
}

impl std::fmt::Display for ZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZipError::IoRead(e) => write!(f, "{}: {}", self.message(), e),
            ZipError::IoWrite(e) => write!(f, "{}: {}", self.message(), e),
            ZipError::IoSeek(e) => write!(f, "{}: {}", self.message(), e),
            ZipError::Corrupt(detail) => write!(f, "{}: {}", self.message(), detail),
            ZipError::NotFound(name) => write!(f, "{}: {}", self.message(), name),
            ZipError::Args(detail) => write!(f, "{}: {}", self.message(), detail),
            ZipError::InflateInternal(detail) => write!(f, "{}: {}", self.message(), detail),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ZipError {}

impl From<io::Error> for ZipError {
    fn from(err: io::Error) -> Self {
        ZipError::IoRead(err)
    }
}

/// Progress/status signal returned from streaming extract/write calls.
///
/// `More` is not an error: it indicates the caller's output buffer filled (or
/// the input ran out) before the entry finished, and another call is needed
/// to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation ran to completion.
    Ok,
    /// Call again to continue; state is preserved.
    More,
}
