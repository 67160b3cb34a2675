//! Zerocopy views of a 512-byte header block and single-block decoding.
//!
//! The structs here are `#[repr(C)]` byte layouts: each field is a fixed-width
//! array in on-disk order, so viewing a block through one of them slices the
//! fields without copying. [`Header`] wraps a block, detects its dialect,
//! validates the checksum and decodes it into a [`ParsedEntry`].

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::entry::{Dialect, Extensions, FileType, GnuFields, ParsedEntry, UstarFields};
use crate::octal::{parse_numeric, parse_octal, truncate_null};
use crate::{HeaderError, Result, GNU_MAGIC, HEADER_SIZE, USTAR_MAGIC};

/// Byte range of the checksum field.
const CHECKSUM_RANGE: std::ops::Range<usize> = 148..156;

/// Byte range of the dialect magic.
const MAGIC_RANGE: std::ops::Range<usize> = 257..263;

/// Raw 512-byte tar header block.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RawHeader {
    /// The raw header bytes.
    pub bytes: [u8; 512],
}

/// Plain (pre-POSIX) header: only the basic fields are defined.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct OldHeader {
    /// File path name (null-terminated if shorter than 100 bytes).
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// File size in octal ASCII.
    pub size: [u8; 12],
    /// Modification time as Unix timestamp in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum in octal ASCII.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name for hard/symbolic links.
    pub linkname: [u8; 100],
    /// Undefined in this format.
    pub pad: [u8; 255],
}

impl fmt::Debug for OldHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OldHeader")
            .field("name", &String::from_utf8_lossy(truncate_null(&self.name)))
            .field("mode", &String::from_utf8_lossy(truncate_null(&self.mode)))
            .field("typeflag", &self.typeflag)
            .finish_non_exhaustive()
    }
}

/// POSIX ustar header.
///
/// | Offset | Size | Field     |
/// |--------|------|-----------|
/// | 257    | 6    | magic     |
/// | 263    | 2    | version   |
/// | 265    | 32   | uname     |
/// | 297    | 32   | gname     |
/// | 329    | 8    | devmajor  |
/// | 337    | 8    | devminor  |
/// | 345    | 155  | prefix    |
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct UstarHeader {
    /// File path name.
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// File size in octal ASCII.
    pub size: [u8; 12],
    /// Modification time in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum in octal ASCII.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name.
    pub linkname: [u8; 100],
    /// `"ustar\0"`.
    pub magic: [u8; 6],
    /// Format version in octal ASCII (`"00"`).
    pub version: [u8; 2],
    /// Owner user name (null-terminated).
    pub uname: [u8; 32],
    /// Owner group name (null-terminated).
    pub gname: [u8; 32],
    /// Device major number in octal ASCII.
    pub devmajor: [u8; 8],
    /// Device minor number in octal ASCII.
    pub devminor: [u8; 8],
    /// Path prefix for names longer than 100 bytes.
    pub prefix: [u8; 155],
    /// Padding to fill the 512-byte block.
    pub pad: [u8; 12],
}

impl fmt::Debug for UstarHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UstarHeader")
            .field("name", &String::from_utf8_lossy(truncate_null(&self.name)))
            .field("typeflag", &self.typeflag)
            .field(
                "prefix",
                &String::from_utf8_lossy(truncate_null(&self.prefix)),
            )
            .finish_non_exhaustive()
    }
}

/// GNU tar sparse region descriptor: two 12-byte octal fields.
#[derive(Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct GnuSparseHeader {
    /// Byte offset of this region within the file.
    pub offset: [u8; 12],
    /// Number of bytes in this region.
    pub numbytes: [u8; 12],
}

impl fmt::Debug for GnuSparseHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GnuSparseHeader")
            .field("offset", &parse_octal(&self.offset).ok())
            .field("numbytes", &parse_octal(&self.numbytes).ok())
            .finish()
    }
}

/// GNU tar header.
///
/// Shares the ustar layout up to `devminor`; the prefix area holds times,
/// the multivolume offset and sparse bookkeeping instead.
///
/// | Offset | Size | Field       |
/// |--------|------|-------------|
/// | 345    | 12   | atime       |
/// | 357    | 12   | ctime       |
/// | 369    | 12   | offset      |
/// | 381    | 4    | longnames   |
/// | 386    | 96   | sparse      |
/// | 482    | 1    | isextended  |
/// | 483    | 12   | realsize    |
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct GnuHeader {
    /// File path name.
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// File size in octal ASCII (for sparse files, the size stored).
    pub size: [u8; 12],
    /// Modification time in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum in octal ASCII.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name.
    pub linkname: [u8; 100],
    /// `"ustar "`.
    pub magic: [u8; 6],
    /// Format version (`" \0"`).
    pub version: [u8; 2],
    /// Owner user name (null-terminated).
    pub uname: [u8; 32],
    /// Owner group name (null-terminated).
    pub gname: [u8; 32],
    /// Device major number in octal ASCII.
    pub devmajor: [u8; 8],
    /// Device minor number in octal ASCII.
    pub devminor: [u8; 8],
    /// Access time in octal ASCII.
    pub atime: [u8; 12],
    /// Change time in octal ASCII.
    pub ctime: [u8; 12],
    /// Offset for multivolume archives.
    pub offset: [u8; 12],
    /// Long names support (deprecated).
    pub longnames: [u8; 4],
    /// Unused padding byte.
    pub unused: u8,
    /// Sparse region descriptors.
    pub sparse: [GnuSparseHeader; 4],
    /// Flag indicating more sparse headers follow.
    pub isextended: u8,
    /// Real size of a sparse file.
    pub realsize: [u8; 12],
    /// Padding to fill the 512-byte block.
    pub pad: [u8; 17],
}

impl fmt::Debug for GnuHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GnuHeader")
            .field("name", &String::from_utf8_lossy(truncate_null(&self.name)))
            .field("typeflag", &self.typeflag)
            .field("isextended", &self.isextended)
            .finish_non_exhaustive()
    }
}

/// Raw type marker of a header block.
///
/// Besides the filesystem types this includes the markers of continuation
/// records, which never reach the caller as entries of their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file (type '0' or '\0' for old tar compatibility).
    Regular,
    /// Hard link to another file in the archive (type '1').
    Link,
    /// Symbolic link (type '2').
    Symlink,
    /// Character device (type '3').
    Char,
    /// Block device (type '4').
    Block,
    /// Directory (type '5').
    Directory,
    /// FIFO/named pipe (type '6').
    Fifo,
    /// GNU directory dump (type 'D').
    GnuDirectory,
    /// GNU long name continuation (type 'L').
    GnuLongName,
    /// GNU long link continuation (type 'K').
    GnuLongLink,
    /// GNU sparse file (type 'S').
    GnuSparse,
    /// PAX extended header for the next entry (type 'x').
    XHeader,
    /// PAX global extended header (type 'g').
    XGlobalHeader,
    /// Any other marker.
    Other(u8),
}

impl EntryType {
    /// Parse an entry type from a raw byte value.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'1' => EntryType::Link,
            b'2' => EntryType::Symlink,
            b'3' => EntryType::Char,
            b'4' => EntryType::Block,
            b'5' => EntryType::Directory,
            b'6' => EntryType::Fifo,
            b'D' => EntryType::GnuDirectory,
            b'L' => EntryType::GnuLongName,
            b'K' => EntryType::GnuLongLink,
            b'S' => EntryType::GnuSparse,
            b'x' => EntryType::XHeader,
            b'g' => EntryType::XGlobalHeader,
            other => EntryType::Other(other),
        }
    }

    /// Convert an entry type to its raw byte representation.
    ///
    /// Note that `Regular` is encoded as '0', not '\0'.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::Link => b'1',
            EntryType::Symlink => b'2',
            EntryType::Char => b'3',
            EntryType::Block => b'4',
            EntryType::Directory => b'5',
            EntryType::Fifo => b'6',
            EntryType::GnuDirectory => b'D',
            EntryType::GnuLongName => b'L',
            EntryType::GnuLongLink => b'K',
            EntryType::GnuSparse => b'S',
            EntryType::XHeader => b'x',
            EntryType::XGlobalHeader => b'g',
            EntryType::Other(b) => b,
        }
    }

    /// Whether this marker introduces a continuation record for the next
    /// header rather than describing a filesystem entry.
    #[must_use]
    pub fn is_continuation(self) -> bool {
        matches!(
            self,
            EntryType::GnuLongName
                | EntryType::GnuLongLink
                | EntryType::XHeader
                | EntryType::XGlobalHeader
        )
    }
}

impl From<u8> for EntryType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

/// Header dialect, as detected from the magic at offset 257.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderFormat {
    /// Neither magic present.
    Old,
    /// `"ustar\0"`.
    Ustar,
    /// `"ustar "`.
    Gnu,
}

/// A 512-byte header block with accessor methods.
#[derive(Clone, Copy, FromBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct Header {
    raw: RawHeader,
}

impl Header {
    /// Parse a header from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::InsufficientData`] if the slice is shorter than
    /// a block.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Header> {
        let block: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(HeaderError::InsufficientData(bytes.len()))?;
        Ok(Self::from_bytes_exact(block))
    }

    /// View exactly 512 bytes as a header.
    #[must_use]
    pub fn from_bytes_exact(bytes: &[u8; HEADER_SIZE]) -> &Header {
        // Header is repr(transparent) over RawHeader, a plain [u8; 512].
        let raw = RawHeader::ref_from_bytes(bytes).expect("size is correct");
        zerocopy::transmute_ref!(raw)
    }

    /// Get a reference to the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.raw.bytes
    }

    /// View this header with only the basic fields.
    #[must_use]
    pub fn as_old(&self) -> &OldHeader {
        OldHeader::ref_from_bytes(&self.raw.bytes).expect("size is correct")
    }

    /// View this header as a POSIX ustar header.
    #[must_use]
    pub fn as_ustar(&self) -> &UstarHeader {
        UstarHeader::ref_from_bytes(&self.raw.bytes).expect("size is correct")
    }

    /// View this header as a GNU header.
    #[must_use]
    pub fn as_gnu(&self) -> &GnuHeader {
        GnuHeader::ref_from_bytes(&self.raw.bytes).expect("size is correct")
    }

    /// Detect the dialect from the 6-byte magic at offset 257.
    #[must_use]
    pub fn format(&self) -> HeaderFormat {
        match &self.raw.bytes[MAGIC_RANGE] {
            magic if magic == USTAR_MAGIC => HeaderFormat::Ustar,
            magic if magic == GNU_MAGIC => HeaderFormat::Gnu,
            _ => HeaderFormat::Old,
        }
    }

    /// Get the raw entry type marker.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.as_old().typeflag)
    }

    /// Check if this block is all zeros (an end-of-archive marker).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.bytes.iter().all(|&b| b == 0)
    }

    /// Compute the unsigned and signed byte sums of the block.
    ///
    /// The checksum field itself counts as eight spaces. Implementations
    /// historically disagree on whether bytes are signed, so both are kept.
    #[must_use]
    pub fn compute_checksums(&self) -> (u64, i64) {
        let mut unsigned: u64 = 0;
        let mut signed: i64 = 0;
        for (i, &byte) in self.raw.bytes.iter().enumerate() {
            let byte = if CHECKSUM_RANGE.contains(&i) { b' ' } else { byte };
            unsigned += u64::from(byte);
            signed += i64::from(byte as i8);
        }
        (unsigned, signed)
    }

    /// Verify the stored checksum against both byte sums.
    ///
    /// Returns the stored checksum on success.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::ChecksumMismatch`] carrying both sums and the
    /// raw block if neither sum matches, or an octal error if the checksum
    /// field cannot be decoded.
    pub fn verify_checksum(&self) -> Result<u64> {
        let expected = parse_numeric(&self.as_old().checksum)?;
        let (unsigned, signed) = self.compute_checksums();
        if expected == unsigned || i64::try_from(expected).is_ok_and(|e| e == signed) {
            Ok(expected)
        } else {
            Err(HeaderError::ChecksumMismatch {
                expected,
                unsigned,
                signed,
                header: Box::new(self.raw.bytes),
            })
        }
    }

    /// Decode this block into a logical entry.
    ///
    /// The checksum is validated before any other field is interpreted, so a
    /// corrupted block reports [`HeaderError::ChecksumMismatch`] rather than a
    /// field error. Continuation records are decoded like any other header;
    /// merging them is the job of [`crate::stream::TarReader`].
    ///
    /// # Errors
    ///
    /// Returns a checksum or field decoding error.
    pub fn decode(&self) -> Result<ParsedEntry> {
        let checksum = self.verify_checksum()?;
        let old = self.as_old();

        let entry_type = self.entry_type();
        let file_type = FileType::from_entry_type(entry_type);
        let mode = file_type.reconcile_mode(parse_numeric(&old.mode)?);
        let name = truncate_null(&old.name);

        let (path, dialect) = match self.format() {
            HeaderFormat::Old => (name.to_vec(), Dialect::Plain),
            HeaderFormat::Ustar => {
                let fields = self.decode_ustar()?;
                (join_prefix(&fields.prefix, name), Dialect::Ustar(fields))
            }
            HeaderFormat::Gnu => (name.to_vec(), Dialect::Gnu(self.decode_gnu()?)),
        };

        Ok(ParsedEntry {
            path,
            mode,
            uid: parse_numeric(&old.uid)?,
            gid: parse_numeric(&old.gid)?,
            size: parse_numeric(&old.size)?,
            mtime: parse_numeric(&old.mtime)?,
            checksum,
            entry_type,
            file_type,
            linkpath: truncate_null(&old.linkname).to_vec(),
            dialect,
            extensions: Extensions::default(),
        })
    }

    fn decode_ustar(&self) -> Result<UstarFields> {
        let ustar = self.as_ustar();
        Ok(UstarFields {
            magic: ustar.magic,
            version: parse_octal(&ustar.version)?,
            uname: truncate_null(&ustar.uname).to_vec(),
            gname: truncate_null(&ustar.gname).to_vec(),
            major: parse_numeric(&ustar.devmajor)?,
            minor: parse_numeric(&ustar.devminor)?,
            prefix: truncate_null(&ustar.prefix).to_vec(),
        })
    }

    fn decode_gnu(&self) -> Result<GnuFields> {
        let gnu = self.as_gnu();
        Ok(GnuFields {
            magic: gnu.magic,
            version: parse_octal(&gnu.version)?,
            uname: truncate_null(&gnu.uname).to_vec(),
            gname: truncate_null(&gnu.gname).to_vec(),
            major: parse_numeric(&gnu.devmajor)?,
            minor: parse_numeric(&gnu.devminor)?,
            atime: parse_numeric(&gnu.atime)?,
            ctime: parse_numeric(&gnu.ctime)?,
            offset: parse_numeric(&gnu.offset)?,
            longnames: gnu.longnames,
            sparse: gnu.sparse,
            isextended: gnu.isextended,
            realsize: gnu.realsize,
        })
    }
}

/// Join a ustar prefix and name with a `/`; an empty prefix leaves the name.
fn join_prefix(prefix: &[u8], name: &[u8]) -> Vec<u8> {
    if prefix.is_empty() {
        return name.to_vec();
    }
    let mut path = Vec::with_capacity(prefix.len() + 1 + name.len());
    path.extend_from_slice(prefix);
    path.push(b'/');
    path.extend_from_slice(name);
    path
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let old = self.as_old();
        f.debug_struct("Header")
            .field("name", &String::from_utf8_lossy(truncate_null(&old.name)))
            .field("entry_type", &self.entry_type())
            .field("size", &parse_numeric(&old.size).ok())
            .field("format", &self.format())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write `value` as zero-padded octal with a trailing NUL.
    fn put_octal(field: &mut [u8], value: u64) {
        let digits = format!("{value:0width$o}", width = field.len() - 1);
        field[..digits.len()].copy_from_slice(digits.as_bytes());
        field[digits.len()] = 0;
    }

    fn seal(block: &mut [u8; HEADER_SIZE]) {
        let (unsigned, _) = Header::from_bytes_exact(block).compute_checksums();
        let digits = format!("{unsigned:06o}\0 ");
        block[CHECKSUM_RANGE].copy_from_slice(digits.as_bytes());
    }

    fn basic_block(name: &str, typeflag: u8, mode: u64, size: u64) -> [u8; HEADER_SIZE] {
        let mut block = [0u8; HEADER_SIZE];
        block[..name.len()].copy_from_slice(name.as_bytes());
        put_octal(&mut block[100..108], mode);
        put_octal(&mut block[108..116], 1000);
        put_octal(&mut block[116..124], 100);
        put_octal(&mut block[124..136], size);
        put_octal(&mut block[136..148], 1234567890);
        block[156] = typeflag;
        block
    }

    #[test]
    fn test_header_size() {
        assert_eq!(size_of::<RawHeader>(), HEADER_SIZE);
        assert_eq!(size_of::<OldHeader>(), HEADER_SIZE);
        assert_eq!(size_of::<UstarHeader>(), HEADER_SIZE);
        assert_eq!(size_of::<GnuHeader>(), HEADER_SIZE);
        assert_eq!(size_of::<Header>(), HEADER_SIZE);
        assert_eq!(size_of::<GnuSparseHeader>(), 24);
    }

    #[test]
    fn test_from_bytes_insufficient() {
        let short = [0u8; 100];
        let result = Header::from_bytes(&short);
        assert!(matches!(result, Err(HeaderError::InsufficientData(100))));
    }

    #[test]
    fn test_format_detection() {
        let mut block = [0u8; HEADER_SIZE];
        assert_eq!(Header::from_bytes_exact(&block).format(), HeaderFormat::Old);

        block[MAGIC_RANGE].copy_from_slice(USTAR_MAGIC);
        assert_eq!(
            Header::from_bytes_exact(&block).format(),
            HeaderFormat::Ustar
        );

        block[MAGIC_RANGE].copy_from_slice(GNU_MAGIC);
        assert_eq!(Header::from_bytes_exact(&block).format(), HeaderFormat::Gnu);
    }

    #[test]
    fn test_entry_type_roundtrip() {
        for byte in [
            b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'D', b'L', b'K', b'S', b'x', b'g', b'V',
        ] {
            assert_eq!(EntryType::from_byte(byte).to_byte(), byte);
        }
        assert_eq!(EntryType::from_byte(b'\0'), EntryType::Regular);
        assert!(EntryType::GnuLongName.is_continuation());
        assert!(!EntryType::GnuSparse.is_continuation());
    }

    #[test]
    fn test_decode_plain() {
        let mut block = basic_block("hello.txt", b'0', 0o644, 13);
        seal(&mut block);

        let entry = Header::from_bytes_exact(&block).decode().unwrap();
        assert_eq!(entry.path, b"hello.txt");
        assert_eq!(entry.mode, 0o100644);
        assert_eq!(entry.uid, 1000);
        assert_eq!(entry.gid, 100);
        assert_eq!(entry.size, 13);
        assert_eq!(entry.mtime, 1234567890);
        assert_eq!(entry.file_type, FileType::Regular);
        assert_eq!(entry.dialect, Dialect::Plain);
    }

    #[test]
    fn test_decode_mode_type_bits_from_type() {
        // Raw mode claims a directory, the type says symlink.
        let mut block = basic_block("link", b'2', 0o040777, 0);
        seal(&mut block);
        let entry = Header::from_bytes_exact(&block).decode().unwrap();
        assert_eq!(entry.mode, 0o120777);

        // Unknown marker falls back to a regular file.
        let mut block = basic_block("odd", b'V', 0o600, 0);
        seal(&mut block);
        let entry = Header::from_bytes_exact(&block).decode().unwrap();
        assert_eq!(entry.file_type, FileType::Regular);
        assert_eq!(entry.mode, 0o100600);
    }

    #[test]
    fn test_decode_ustar_prefix() {
        let mut block = basic_block("file.txt", b'0', 0o644, 0);
        block[MAGIC_RANGE].copy_from_slice(USTAR_MAGIC);
        block[263..265].copy_from_slice(b"00");
        block[265..270].copy_from_slice(b"alice");
        block[297..302].copy_from_slice(b"staff");
        block[345..356].copy_from_slice(b"some/prefix");
        seal(&mut block);

        let entry = Header::from_bytes_exact(&block).decode().unwrap();
        assert_eq!(entry.path, b"some/prefix/file.txt");
        let Dialect::Ustar(fields) = &entry.dialect else {
            panic!("expected ustar dialect, got {:?}", entry.dialect);
        };
        assert_eq!(fields.uname, b"alice");
        assert_eq!(fields.gname, b"staff");
        assert_eq!(fields.prefix, b"some/prefix");
        assert_eq!(fields.version, 0);
        assert_eq!(entry.get("prefix").as_deref(), Some("some/prefix"));
    }

    #[test]
    fn test_decode_gnu_fields() {
        let mut block = basic_block("gnufile", b'0', 0o644, 0);
        block[MAGIC_RANGE].copy_from_slice(GNU_MAGIC);
        block[263..265].copy_from_slice(b" \0");
        put_octal(&mut block[345..357], 1111);
        put_octal(&mut block[357..369], 2222);
        block[482] = 1;
        seal(&mut block);

        let entry = Header::from_bytes_exact(&block).decode().unwrap();
        // GNU headers have no prefix: bytes 345.. are times
        assert_eq!(entry.path, b"gnufile");
        let Dialect::Gnu(fields) = &entry.dialect else {
            panic!("expected GNU dialect, got {:?}", entry.dialect);
        };
        assert_eq!(fields.atime, 1111);
        assert_eq!(fields.ctime, 2222);
        assert_eq!(fields.isextended, 1);
        assert_eq!(fields.version, 0);
    }

    #[test]
    fn test_decode_gnu_directory_marker() {
        let mut block = basic_block("dump/", b'D', 0o755, 0);
        block[MAGIC_RANGE].copy_from_slice(GNU_MAGIC);
        seal(&mut block);

        let entry = Header::from_bytes_exact(&block).decode().unwrap();
        assert_eq!(entry.entry_type, EntryType::GnuDirectory);
        assert_eq!(entry.file_type, FileType::Directory);
        assert_eq!(entry.mode, 0o040755);
    }

    #[test]
    fn test_decode_long_octal_size() {
        let mut block = basic_block("big", b'0', 0o644, 0);
        block[124..136].copy_from_slice(b"100000000000");
        seal(&mut block);

        let entry = Header::from_bytes_exact(&block).decode().unwrap();
        assert_eq!(entry.size, 1 << 33);
    }

    #[test]
    fn test_checksum_accepts_signed_sum() {
        let mut block = basic_block("high", b'0', 0o644, 0);
        // A byte >= 0x80 makes the two sums differ
        block[50] = 0xff;
        let (unsigned, signed) = Header::from_bytes_exact(&block).compute_checksums();
        assert_eq!(unsigned - 256, signed as u64);

        let digits = format!("{signed:06o}\0 ");
        block[CHECKSUM_RANGE].copy_from_slice(digits.as_bytes());
        assert_eq!(
            Header::from_bytes_exact(&block).verify_checksum().unwrap(),
            signed as u64
        );
    }

    #[test]
    fn test_checksum_mismatch_reports_both_sums() {
        let mut block = basic_block("corrupt", b'0', 0o644, 0);
        seal(&mut block);
        block[0] = b'C';

        let err = Header::from_bytes_exact(&block).decode().unwrap_err();
        let HeaderError::ChecksumMismatch {
            expected,
            unsigned,
            signed,
            ..
        } = &err
        else {
            panic!("expected checksum mismatch, got {err:?}");
        };
        assert_ne!(*expected, *unsigned);
        assert_eq!(*unsigned as i64, *signed);

        let message = err.to_string();
        assert!(message.contains("Corrupt"), "{message}");
        assert!(message.contains(&unsigned.to_string()), "{message}");
        assert!(err.header_hex().unwrap().starts_with("436f7272757074"));
    }

    #[test]
    fn test_checksum_precedes_field_errors() {
        let mut block = basic_block("file", b'0', 0o644, 0);
        seal(&mut block);
        // Not an octal digit, and the checksum no longer matches either
        block[125] = b'9';
        assert!(matches!(
            Header::from_bytes_exact(&block).decode(),
            Err(HeaderError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_is_empty() {
        let block = [0u8; HEADER_SIZE];
        assert!(Header::from_bytes_exact(&block).is_empty());
        let mut block = block;
        block[511] = 1;
        assert!(!Header::from_bytes_exact(&block).is_empty());
    }

    #[test]
    fn test_debug_impls() {
        let block = basic_block("dbg", b'0', 0o644, 0);
        let header = Header::from_bytes_exact(&block);
        let _ = format!("{header:?}");
        let _ = format!("{:?}", header.as_old());
        let _ = format!("{:?}", header.as_ustar());
        let _ = format!("{:?}", header.as_gnu());
        let _ = format!("{:?}", GnuSparseHeader::default());
    }
}
