//! Forward-only decoding of tar archives.
//!
//! This crate reads a tar archive strictly in stream order, one entry at a
//! time: decode the next header, then (optionally) read its body. There is no
//! seeking and no writing. The layers, leaves first:
//!
//! - [`octal`]: fixed-width field extraction and numeric decoding, including
//!   the chunked "long octal" scheme used for values that overflow the
//!   classic field widths
//! - [`header`]: zerocopy views of a 512-byte block, dialect detection
//!   (plain, POSIX ustar, GNU), checksum validation and decoding into a
//!   [`ParsedEntry`]
//! - [`pax`]: iteration over PAX extended-attribute records
//! - [`stream`]: the [`TarReader`] cursor that merges continuation records
//!   (GNU long name/link, PAX headers) into the entry that follows them and
//!   keeps the stream aligned across bodies and padding
//!
//! # Header Field Layout
//!
//! | Offset | Size | Field     | Description                              |
//! |--------|------|-----------|------------------------------------------|
//! | 0      | 100  | name      | File path (null-terminated if < 100)     |
//! | 100    | 8    | mode      | File mode in octal ASCII                 |
//! | 108    | 8    | uid       | Owner user ID in octal ASCII             |
//! | 116    | 8    | gid       | Owner group ID in octal ASCII            |
//! | 124    | 12   | size      | File size in octal ASCII                 |
//! | 136    | 12   | mtime     | Modification time (Unix epoch, octal)    |
//! | 148    | 8    | checksum  | Header checksum in octal ASCII           |
//! | 156    | 1    | typeflag  | Entry type (see [`EntryType`])           |
//! | 157    | 100  | linkname  | Link target for hard/symbolic links      |
//! | 257    | 6    | magic     | `"ustar\0"` (POSIX) or `"ustar "` (GNU)  |
//!
//! The remaining bytes are laid out per dialect, see [`UstarHeader`] and
//! [`GnuHeader`].
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use tar_cursor::TarReader;
//!
//! let file = File::open("archive.tar").unwrap();
//! let mut reader = TarReader::with_defaults(BufReader::new(file));
//!
//! while let Some(entry) = reader.read_header().unwrap() {
//!     let data = reader.read_data().unwrap();
//!     println!("{} ({} bytes)", entry.path_lossy(), data.len());
//! }
//! ```

pub mod entry;
pub mod header;
pub mod octal;
pub mod pax;
pub mod stream;

use thiserror::Error;

pub use entry::{Dialect, Extensions, FileType, GnuFields, ParsedEntry, UstarFields};
pub use header::{EntryType, GnuHeader, GnuSparseHeader, Header, HeaderFormat, OldHeader, UstarHeader};
pub use octal::{parse_long_octal, parse_numeric, parse_octal, truncate_null};
pub use pax::{PaxError, PaxExtension, PaxExtensions};
pub use stream::{Limits, StreamError, TarReader};

/// Size of a tar block (and of every header) in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Size of a tar header block in bytes.
pub const HEADER_SIZE: usize = BLOCK_SIZE;

/// Magic string for POSIX ustar headers ("ustar\0").
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Magic string for GNU tar headers ("ustar ").
pub const GNU_MAGIC: &[u8; 6] = b"ustar ";

/// Errors that can occur when decoding a single header block.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The provided data is too short to contain a header.
    #[error("insufficient data: expected {HEADER_SIZE} bytes, got {0}")]
    InsufficientData(usize),

    /// A numeric field contains characters other than octal digits.
    #[error("invalid octal field: {:?}", .0.escape_ascii().to_string())]
    InvalidOctal(Vec<u8>),

    /// A numeric field decodes to a value wider than 64 bits.
    #[error("numeric field overflows 64 bits: {:?}", .0.escape_ascii().to_string())]
    NumericOverflow(Vec<u8>),

    /// The stored checksum matches neither the unsigned nor the signed byte sum.
    #[error(
        "checksum mismatch: header says {expected}, computed {unsigned} (unsigned) / {signed} (signed); header bytes: \"{}\"",
        .header.as_slice().escape_ascii()
    )]
    ChecksumMismatch {
        /// The checksum value stored in the header.
        expected: u64,
        /// Sum of the header bytes read as unsigned.
        unsigned: u64,
        /// Sum of the header bytes read as signed.
        signed: i64,
        /// The offending header block.
        header: Box<[u8; HEADER_SIZE]>,
    },
}

impl HeaderError {
    /// Hex rendering of the offending header block, for checksum failures.
    #[must_use]
    pub fn header_hex(&self) -> Option<String> {
        match self {
            HeaderError::ChecksumMismatch { header, .. } => Some(hex::encode(header.as_slice())),
            _ => None,
        }
    }
}

/// Result type for header decoding operations.
pub type Result<T> = std::result::Result<T, HeaderError>;
