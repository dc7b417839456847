//! # szip-core: self-contained ZIP archive library
//!
//! `szip-core` reads and writes ZIP archives conforming to the PKWARE APPNOTE
//! v2.0 format, with a from-scratch DEFLATE/INFLATE codec (RFC 1951) and
//! legacy PKWARE "traditional" (ZipCrypto) stream encryption. It does not
//! shell out to, or link against, any external archiver.
//!
//! ## Scope
//!
//! - STORE and DEFLATE methods, local headers, central directory, EOCD.
//! - Data descriptors for archives written to non-seekable sinks (pipes).
//! - Traditional PKWARE encryption (not AES / WinZip AE-x).
//! - Extended-timestamp (`0x5455`) extra-field recovery of Unix mtimes.
//!
//! Not supported: ZIP64, AES encryption, multi-volume/split archives,
//! digital signatures, in-place modification of an existing archive.
//!
//! ## Quick start
//!
//! ### Writing
//!
//! ```no_run
//! use szip_core::ZipWriter;
//!
//! let mut writer = ZipWriter::new("out.zip")?;
//! writer.add_entry("hello.txt", b"Hello\n")?;
//! writer.add_folder("docs/")?;
//! writer.finish()?;
//! # Ok::<(), szip_core::ZipError>(())
//! ```
//!
//! ### Reading
//!
//! ```no_run
//! use szip_core::ZipReader;
//!
//! let mut reader = ZipReader::new("out.zip")?;
//! for entry in reader.entries() {
//!     println!("{}: {} bytes", entry.name, entry.uncompressed_size);
//! }
//! let data = reader.extract_to_vec(0)?;
//! # Ok::<(), szip_core::ZipError>(())
//! ```

pub mod bitstream;
pub mod container;
pub mod crc32;
pub mod crypto;
pub mod deflate;
pub mod dostime;
pub mod error;
pub mod huffman;
pub mod inflate;
pub mod io_adaptor;
pub mod reader;
pub mod window;
pub mod writer;

pub use container::{Entry, Method};
pub use error::{Result, Status, ZipError};
pub use reader::ZipReader;
pub use writer::{CompressionLevel, ZipWriter};
