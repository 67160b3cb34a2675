//! The logical header returned for each archive entry.
//!
//! A [`ParsedEntry`] keeps the well-known fields in typed form and carries an
//! [`Extensions`] overlay for PAX records. The overlay is consulted first by
//! [`ParsedEntry::get`], so a PAX record always wins over a same-named field.

use std::borrow::Cow;

use crate::header::{EntryType, GnuSparseHeader};
use crate::{truncate_null, BLOCK_SIZE};

/// PAX extended header key for the file path.
pub const PAX_PATH: &str = "path";
/// PAX extended header key for the link target path.
pub const PAX_LINKPATH: &str = "linkpath";
/// PAX extended header key for file size.
pub const PAX_SIZE: &str = "size";
/// PAX extended header key for owner user ID.
pub const PAX_UID: &str = "uid";
/// PAX extended header key for owner group ID.
pub const PAX_GID: &str = "gid";
/// PAX extended header key for owner user name.
pub const PAX_UNAME: &str = "uname";
/// PAX extended header key for owner group name.
pub const PAX_GNAME: &str = "gname";
/// PAX extended header key for modification time.
pub const PAX_MTIME: &str = "mtime";
/// PAX extended header key for access time.
pub const PAX_ATIME: &str = "atime";
/// PAX extended header key for change time.
pub const PAX_CTIME: &str = "ctime";

const S_IFIFO: u32 = 0o010000;
const S_IFCHR: u32 = 0o020000;
const S_IFDIR: u32 = 0o040000;
const S_IFBLK: u32 = 0o060000;
const S_IFREG: u32 = 0o100000;
const S_IFLNK: u32 = 0o120000;

/// Permission bits of a mode (including setuid/setgid/sticky).
const PERMISSION_MASK: u64 = 0o7777;

/// Logical file type of an entry.
///
/// This is what a caller sees after continuation records and dialect markers
/// have been folded away. Unknown type markers decode as [`FileType::Regular`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Regular file.
    Regular,
    /// Hard link to an earlier entry.
    HardLink,
    /// Symbolic link.
    Symlink,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Directory.
    Directory,
    /// FIFO/named pipe.
    Fifo,
}

/// Types for the markers `'0'` through `'6'`, in marker order.
const TYPE_TABLE: [FileType; 7] = [
    FileType::Regular,
    FileType::HardLink,
    FileType::Symlink,
    FileType::CharDevice,
    FileType::BlockDevice,
    FileType::Directory,
    FileType::Fifo,
];

impl FileType {
    /// Map a raw type marker byte through the type table.
    ///
    /// Digits `'0'`-`'6'` index the table; every other marker is a regular file.
    #[must_use]
    pub fn from_marker(marker: u8) -> Self {
        match marker {
            b'0'..=b'6' => TYPE_TABLE[usize::from(marker - b'0')],
            _ => FileType::Regular,
        }
    }

    /// Logical type for a decoded entry type, with GNU dialect markers applied.
    ///
    /// The GNU directory marker (`'D'`) normalizes to [`FileType::Directory`].
    #[must_use]
    pub fn from_entry_type(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::GnuDirectory => FileType::Directory,
            other => Self::from_marker(other.to_byte()),
        }
    }

    /// The single-character tag of this type (`'0'` through `'6'`).
    #[must_use]
    pub fn tag(self) -> char {
        let index = TYPE_TABLE
            .iter()
            .position(|&t| t == self)
            .unwrap_or_default();
        char::from(b'0' + index as u8)
    }

    /// The `S_IF*` file-type bits for this type.
    ///
    /// Hard links carry regular-file bits.
    #[must_use]
    pub fn mode_bits(self) -> u32 {
        match self {
            FileType::Regular | FileType::HardLink => S_IFREG,
            FileType::Symlink => S_IFLNK,
            FileType::CharDevice => S_IFCHR,
            FileType::BlockDevice => S_IFBLK,
            FileType::Directory => S_IFDIR,
            FileType::Fifo => S_IFIFO,
        }
    }

    /// Combine the permission bits of a raw header mode with this type's bits.
    ///
    /// File-type bits present in the raw field are discarded.
    #[must_use]
    pub fn reconcile_mode(self, raw_mode: u64) -> u32 {
        (raw_mode & PERMISSION_MASK) as u32 | self.mode_bits()
    }
}

/// Insertion-ordered overlay of PAX key/value records.
///
/// Inserting an existing key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extensions {
    records: Vec<(String, Vec<u8>)>,
}

impl Extensions {
    /// Insert or replace a record.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        match self.records.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.records.push((key, value)),
        }
    }

    /// Raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.records
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Iterate over records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.records.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the overlay holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fields specific to POSIX ustar headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UstarFields {
    /// Format magic, `"ustar\0"`.
    pub magic: [u8; 6],
    /// Format version, decoded as octal.
    pub version: u64,
    /// Owner user name.
    pub uname: Vec<u8>,
    /// Owner group name.
    pub gname: Vec<u8>,
    /// Device major number.
    pub major: u64,
    /// Device minor number.
    pub minor: u64,
    /// Path prefix, already joined into [`ParsedEntry::path`].
    pub prefix: Vec<u8>,
}

/// Fields specific to GNU tar headers.
///
/// The sparse bookkeeping fields are kept as stored; sparse bodies are not
/// reconstructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GnuFields {
    /// Format magic, `"ustar "`.
    pub magic: [u8; 6],
    /// Format version, decoded as octal (`" \0"` decodes to 0).
    pub version: u64,
    /// Owner user name.
    pub uname: Vec<u8>,
    /// Owner group name.
    pub gname: Vec<u8>,
    /// Device major number.
    pub major: u64,
    /// Device minor number.
    pub minor: u64,
    /// Access time.
    pub atime: u64,
    /// Change time.
    pub ctime: u64,
    /// Multivolume offset.
    pub offset: u64,
    /// Deprecated long names field, raw.
    pub longnames: [u8; 4],
    /// Sparse region descriptors, raw.
    pub sparse: [GnuSparseHeader; 4],
    /// Whether extended sparse headers follow, raw.
    pub isextended: u8,
    /// Real size of a sparse file, raw.
    pub realsize: [u8; 12],
}

/// Header dialect detected from the magic at offset 257.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// No recognized magic; only the basic fields are meaningful.
    Plain,
    /// POSIX ustar.
    Ustar(UstarFields),
    /// GNU tar.
    Gnu(GnuFields),
}

/// A fully-resolved tar entry with all continuation records applied.
///
/// The value is a snapshot: it owns its data and is not affected by later
/// reads from the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedEntry {
    /// The resolved path.
    ///
    /// A PAX `path` record or GNU long name replaces the ustar prefix plus
    /// header `name`; between several such records the earliest one wins.
    pub path: Vec<u8>,

    /// Permission bits from the header with file-type bits derived from
    /// [`ParsedEntry::file_type`].
    pub mode: u32,

    /// Owner UID.
    pub uid: u64,

    /// Owner GID.
    pub gid: u64,

    /// Body size in bytes.
    pub size: u64,

    /// Modification time as Unix timestamp.
    pub mtime: u64,

    /// Checksum as stored in the header.
    pub checksum: u64,

    /// Raw type marker of the header that described this entry.
    pub entry_type: EntryType,

    /// Logical file type.
    pub file_type: FileType,

    /// The resolved link target; empty when the header has none.
    pub linkpath: Vec<u8>,

    /// Dialect-specific fields.
    pub dialect: Dialect,

    /// PAX records applied to this entry.
    pub extensions: Extensions,
}

impl ParsedEntry {
    /// Get the path as a lossy UTF-8 string.
    #[must_use]
    pub fn path_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path)
    }

    /// Get the link target as a lossy UTF-8 string, if present.
    #[must_use]
    pub fn link_target_lossy(&self) -> Option<Cow<'_, str>> {
        (!self.linkpath.is_empty()).then(|| String::from_utf8_lossy(&self.linkpath))
    }

    /// Owner user name, from the header or a PAX `uname` record.
    #[must_use]
    pub fn uname(&self) -> Option<&[u8]> {
        match &self.dialect {
            Dialect::Ustar(u) => Some(&u.uname),
            Dialect::Gnu(g) => Some(&g.uname),
            Dialect::Plain => self.extensions.get(PAX_UNAME),
        }
    }

    /// Owner group name, from the header or a PAX `gname` record.
    #[must_use]
    pub fn gname(&self) -> Option<&[u8]> {
        match &self.dialect {
            Dialect::Ustar(u) => Some(&u.gname),
            Dialect::Gnu(g) => Some(&g.gname),
            Dialect::Plain => self.extensions.get(PAX_GNAME),
        }
    }

    /// Check if this is a regular file entry.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    /// Check if this is a directory entry.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Check if this is a symbolic link entry.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }

    /// Check if this is a hard link entry.
    #[must_use]
    pub fn is_hard_link(&self) -> bool {
        self.file_type == FileType::HardLink
    }

    /// Whether the header is a GNU sparse marker.
    ///
    /// The body of such an entry is the stored data, not the reconstructed file.
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        self.entry_type == EntryType::GnuSparse
    }

    /// Get the padded size (rounded up to 512-byte boundary).
    ///
    /// Returns `None` if rounding overflows.
    #[must_use]
    pub fn padded_size(&self) -> Option<u64> {
        self.size.checked_next_multiple_of(BLOCK_SIZE as u64)
    }

    /// Apply one PAX record.
    ///
    /// Well-known keys update the typed fields; unparseable numeric values
    /// leave them alone. Every record lands in the overlay.
    pub(crate) fn apply_pax(&mut self, key: &str, value: &[u8]) {
        match key {
            PAX_PATH => self.path = value.to_vec(),
            PAX_LINKPATH => self.linkpath = value.to_vec(),
            PAX_SIZE => set_decimal(&mut self.size, value),
            PAX_UID => set_decimal(&mut self.uid, value),
            PAX_GID => set_decimal(&mut self.gid, value),
            PAX_MTIME => set_seconds(&mut self.mtime, value),
            PAX_UNAME | PAX_GNAME => {
                let name = match (&mut self.dialect, key) {
                    (Dialect::Ustar(u), PAX_UNAME) => Some(&mut u.uname),
                    (Dialect::Ustar(u), _) => Some(&mut u.gname),
                    (Dialect::Gnu(g), PAX_UNAME) => Some(&mut g.uname),
                    (Dialect::Gnu(g), _) => Some(&mut g.gname),
                    (Dialect::Plain, _) => None,
                };
                if let Some(name) = name {
                    *name = value.to_vec();
                }
            }
            PAX_ATIME => {
                if let Dialect::Gnu(g) = &mut self.dialect {
                    set_seconds(&mut g.atime, value);
                }
            }
            PAX_CTIME => {
                if let Dialect::Gnu(g) = &mut self.dialect {
                    set_seconds(&mut g.ctime, value);
                }
            }
            _ => {}
        }
        self.extensions.insert(key, value);
    }

    /// Look up a field by name, as in an open key/value mapping.
    ///
    /// PAX records take precedence over the typed fields. Numbers render in
    /// decimal, `type` renders as its tag character.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        if let Some(value) = self.extensions.get(key) {
            return Some(String::from_utf8_lossy(value));
        }
        let value = match key {
            "path" => String::from_utf8_lossy(&self.path),
            "mode" => Cow::Owned(self.mode.to_string()),
            "uid" => Cow::Owned(self.uid.to_string()),
            "gid" => Cow::Owned(self.gid.to_string()),
            "size" => Cow::Owned(self.size.to_string()),
            "mtime" => Cow::Owned(self.mtime.to_string()),
            "checksum" => Cow::Owned(self.checksum.to_string()),
            "type" => Cow::Owned(self.file_type.tag().to_string()),
            "linkpath" => String::from_utf8_lossy(&self.linkpath),
            _ => return self.dialect_field(key),
        };
        Some(value)
    }

    fn dialect_field(&self, key: &str) -> Option<Cow<'_, str>> {
        self.dialect_fields()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    fn dialect_fields(&self) -> Vec<(&'static str, Cow<'_, str>)> {
        let lossy = |bytes: &[u8]| String::from_utf8_lossy(truncate_null(bytes)).into_owned();
        match &self.dialect {
            Dialect::Plain => Vec::new(),
            Dialect::Ustar(u) => vec![
                ("magic", Cow::Owned(lossy(u.magic.as_slice()))),
                ("version", Cow::Owned(u.version.to_string())),
                ("uname", String::from_utf8_lossy(&u.uname)),
                ("gname", String::from_utf8_lossy(&u.gname)),
                ("major", Cow::Owned(u.major.to_string())),
                ("minor", Cow::Owned(u.minor.to_string())),
                ("prefix", String::from_utf8_lossy(&u.prefix)),
            ],
            Dialect::Gnu(g) => vec![
                ("magic", Cow::Owned(lossy(g.magic.as_slice()))),
                ("version", Cow::Owned(g.version.to_string())),
                ("uname", String::from_utf8_lossy(&g.uname)),
                ("gname", String::from_utf8_lossy(&g.gname)),
                ("major", Cow::Owned(g.major.to_string())),
                ("minor", Cow::Owned(g.minor.to_string())),
                ("atime", Cow::Owned(g.atime.to_string())),
                ("ctime", Cow::Owned(g.ctime.to_string())),
                ("offset", Cow::Owned(g.offset.to_string())),
                ("longnames", Cow::Owned(lossy(g.longnames.as_slice()))),
                ("isextended", Cow::Owned(g.isextended.to_string())),
                ("realsize", Cow::Owned(lossy(g.realsize.as_slice()))),
            ],
        }
    }

    /// All fields as an insertion-ordered list of name/value pairs.
    ///
    /// Header fields come first in layout order, then dialect fields, then
    /// PAX records. A PAX record with the name of an earlier field replaces
    /// that field's value in place.
    #[must_use]
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = [
            "path", "mode", "uid", "gid", "size", "mtime", "checksum", "type", "linkpath",
        ]
        .into_iter()
        .filter_map(|key| {
            let value = match key {
                "path" => String::from_utf8_lossy(&self.path).into_owned(),
                "linkpath" => String::from_utf8_lossy(&self.linkpath).into_owned(),
                "mode" => self.mode.to_string(),
                "uid" => self.uid.to_string(),
                "gid" => self.gid.to_string(),
                "size" => self.size.to_string(),
                "mtime" => self.mtime.to_string(),
                "checksum" => self.checksum.to_string(),
                "type" => self.file_type.tag().to_string(),
                _ => return None,
            };
            Some((key.to_owned(), value))
        })
        .collect();

        fields.extend(
            self.dialect_fields()
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.into_owned())),
        );

        for (key, value) in self.extensions.iter() {
            let value = String::from_utf8_lossy(value).into_owned();
            match fields.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = value,
                None => fields.push((key.to_owned(), value)),
            }
        }
        fields
    }
}

fn set_decimal(target: &mut u64, value: &[u8]) {
    if let Some(v) = std::str::from_utf8(value).ok().and_then(|s| s.parse().ok()) {
        *target = v;
    }
}

/// PAX times may carry a fractional part; only whole seconds are kept.
fn set_seconds(target: &mut u64, value: &[u8]) {
    let whole = value.split(|&b| b == b'.').next().unwrap_or_default();
    set_decimal(target, whole);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_entry() -> ParsedEntry {
        ParsedEntry {
            path: b"file.txt".to_vec(),
            mode: FileType::Regular.reconcile_mode(0o644),
            uid: 1000,
            gid: 1000,
            size: 13,
            mtime: 1234567890,
            checksum: 0,
            entry_type: EntryType::Regular,
            file_type: FileType::Regular,
            linkpath: Vec::new(),
            dialect: Dialect::Plain,
            extensions: Extensions::default(),
        }
    }

    #[test]
    fn test_type_table() {
        assert_eq!(FileType::from_marker(b'0'), FileType::Regular);
        assert_eq!(FileType::from_marker(b'1'), FileType::HardLink);
        assert_eq!(FileType::from_marker(b'2'), FileType::Symlink);
        assert_eq!(FileType::from_marker(b'3'), FileType::CharDevice);
        assert_eq!(FileType::from_marker(b'4'), FileType::BlockDevice);
        assert_eq!(FileType::from_marker(b'5'), FileType::Directory);
        assert_eq!(FileType::from_marker(b'6'), FileType::Fifo);
        assert_eq!(FileType::from_marker(b'7'), FileType::Regular);
        assert_eq!(FileType::from_marker(b'\0'), FileType::Regular);
        assert_eq!(FileType::from_marker(b'S'), FileType::Regular);
    }

    #[test]
    fn test_gnu_directory_marker() {
        assert_eq!(
            FileType::from_entry_type(EntryType::GnuDirectory),
            FileType::Directory
        );
        assert_eq!(
            FileType::from_entry_type(EntryType::GnuSparse),
            FileType::Regular
        );
    }

    #[test]
    fn test_tags() {
        for (i, t) in TYPE_TABLE.iter().enumerate() {
            assert_eq!(t.tag(), char::from(b'0' + i as u8));
        }
    }

    #[test]
    fn test_reconcile_mode_discards_raw_type_bits() {
        // Directory bits in the raw mode of a regular file are replaced.
        assert_eq!(FileType::Regular.reconcile_mode(0o040644), 0o100644);
        assert_eq!(FileType::Directory.reconcile_mode(0o755), 0o040755);
        assert_eq!(FileType::Symlink.reconcile_mode(0o777), 0o120777);
        assert_eq!(FileType::Fifo.reconcile_mode(0o4644), 0o014644);
        assert_eq!(FileType::HardLink.reconcile_mode(0o600), 0o100600);
    }

    #[test]
    fn test_extensions_replace_in_place() {
        let mut ext = Extensions::default();
        ext.insert("a", b"1".as_slice());
        ext.insert("b", b"2".as_slice());
        ext.insert("a", b"3".as_slice());
        let collected: Vec<_> = ext.iter().collect();
        assert_eq!(collected, vec![("a", b"3".as_slice()), ("b", b"2".as_slice())]);
        assert_eq!(ext.len(), 2);
    }

    #[test]
    fn test_apply_pax_well_known() {
        let mut entry = plain_entry();
        entry.apply_pax("path", b"long/path.txt");
        entry.apply_pax("size", b"4096");
        entry.apply_pax("mtime", b"1700000000.123456");
        entry.apply_pax("uid", b"not-a-number");

        assert_eq!(entry.path, b"long/path.txt");
        assert_eq!(entry.size, 4096);
        assert_eq!(entry.mtime, 1700000000);
        assert_eq!(entry.uid, 1000);
        // The unparseable record is still visible through the overlay
        assert_eq!(entry.get("uid").as_deref(), Some("not-a-number"));
        assert_eq!(entry.get("mtime").as_deref(), Some("1700000000.123456"));
    }

    #[test]
    fn test_apply_pax_unknown_key() {
        let mut entry = plain_entry();
        entry.apply_pax("ctime", b"12345");
        assert_eq!(entry.get("ctime").as_deref(), Some("12345"));
        assert_eq!(entry.get("mtime").as_deref(), Some("1234567890"));
    }

    #[test]
    fn test_plain_uname_from_pax() {
        let mut entry = plain_entry();
        assert_eq!(entry.uname(), None);
        entry.apply_pax("uname", b"alice");
        assert_eq!(entry.uname(), Some(b"alice".as_slice()));
    }

    #[test]
    fn test_fields_order_and_override() {
        let mut entry = plain_entry();
        entry.apply_pax("gid", b"42");
        entry.apply_pax("comment", b"hi");

        let fields = entry.fields();
        let keys: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "path", "mode", "uid", "gid", "size", "mtime", "checksum", "type", "linkpath",
                "comment"
            ]
        );
        assert_eq!(fields[3].1, "42");
        assert_eq!(fields[7].1, "0");
    }

    #[test]
    fn test_padded_size() {
        let mut entry = plain_entry();
        assert_eq!(entry.padded_size(), Some(512));
        entry.size = 1024;
        assert_eq!(entry.padded_size(), Some(1024));
        entry.size = 0;
        assert_eq!(entry.padded_size(), Some(0));
        entry.size = u64::MAX;
        assert_eq!(entry.padded_size(), None);
    }
}
