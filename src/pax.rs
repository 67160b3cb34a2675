//! PAX extended header records.
//!
//! The body of a PAX header (`'x'` or `'g'`) is a sequence of records of the
//! form `<length> <key>=<value>\n`, where `<length>` is the decimal length of
//! the whole record, counting its own digits, the space and the newline.

use thiserror::Error;

/// Error parsing a PAX extension record.
#[derive(Debug, Error)]
pub enum PaxError {
    /// A record's length prefix is inconsistent with its contents or with
    /// the data remaining.
    #[error("malformed PAX record at offset {offset}: {reason}")]
    Malformed {
        /// Offset of the record within the PAX body.
        offset: usize,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// The key is not valid UTF-8.
    #[error("PAX key is not valid UTF-8: {0}")]
    InvalidKey(#[from] std::str::Utf8Error),
}

/// A single PAX extended header key/value pair.
#[derive(Debug, Clone)]
pub struct PaxExtension<'a> {
    key: &'a [u8],
    value: &'a [u8],
}

impl<'a> PaxExtension<'a> {
    /// Returns the key as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid UTF-8.
    pub fn key(&self) -> Result<&'a str, PaxError> {
        Ok(std::str::from_utf8(self.key)?)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn key_bytes(&self) -> &'a [u8] {
        self.key
    }

    /// Returns the raw value bytes.
    ///
    /// Values are not required to be UTF-8 (extended attributes are binary).
    #[must_use]
    pub fn value_bytes(&self) -> &'a [u8] {
        self.value
    }
}

/// Iterator over PAX extended header records.
///
/// Iteration stops after the first error.
///
/// # Example
///
/// ```
/// use tar_cursor::PaxExtensions;
///
/// let data = b"20 path=foo/bar.txt\n";
/// let mut iter = PaxExtensions::new(data);
/// let ext = iter.next().unwrap().unwrap();
/// assert_eq!(ext.key().unwrap(), "path");
/// assert_eq!(ext.value_bytes(), b"foo/bar.txt");
/// ```
#[derive(Debug)]
pub struct PaxExtensions<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PaxExtensions<'a> {
    /// Create a new iterator over PAX extension records.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn parse_record(&mut self) -> Result<PaxExtension<'a>, PaxError> {
        let offset = self.offset;
        let malformed = |reason| PaxError::Malformed { offset, reason };

        let space = self
            .data
            .iter()
            .position(|&b| b == b' ')
            .ok_or(malformed("missing length separator"))?;
        let len: usize = std::str::from_utf8(&self.data[..space])
            .ok()
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .ok_or(malformed("invalid length"))?;

        if len > self.data.len() {
            return Err(malformed("length exceeds remaining data"));
        }
        // Room for the prefix, the separator, '=' and the newline
        if len < space + 3 {
            return Err(malformed("length shorter than record"));
        }

        let (record, rest) = self.data.split_at(len);
        let body = record[space + 1..]
            .strip_suffix(b"\n")
            .ok_or(malformed("missing trailing newline"))?;
        let eq = body
            .iter()
            .position(|&b| b == b'=')
            .ok_or(malformed("missing '='"))?;

        self.data = rest;
        self.offset += len;
        Ok(PaxExtension {
            key: &body[..eq],
            value: &body[eq + 1..],
        })
    }
}

impl<'a> Iterator for PaxExtensions<'a> {
    type Item = Result<PaxExtension<'a>, PaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        let record = self.parse_record();
        if record.is_err() {
            self.data = &[];
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &[u8]) -> Vec<(String, Vec<u8>)> {
        PaxExtensions::new(data)
            .map(|ext| {
                let ext = ext.unwrap();
                (ext.key().unwrap().to_owned(), ext.value_bytes().to_vec())
            })
            .collect()
    }

    #[test]
    fn test_pax_simple() {
        let data = b"20 path=foo/bar.txt\n";
        assert_eq!(
            collect(data),
            vec![("path".to_owned(), b"foo/bar.txt".to_vec())]
        );
    }

    #[test]
    fn test_pax_multiple() {
        let data = b"20 path=foo/bar.txt\n12 uid=1000\n15 ctime=12345\n";
        let records = collect(data);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], ("uid".to_owned(), b"1000".to_vec()));
        assert_eq!(records[2], ("ctime".to_owned(), b"12345".to_vec()));
    }

    #[test]
    fn test_pax_empty() {
        assert!(PaxExtensions::new(b"").next().is_none());
    }

    #[test]
    fn test_pax_value_with_equals_and_newline() {
        // Only the first '=' splits; embedded newlines belong to the value
        let data = b"13 k=a=b\nc=d\n";
        assert_eq!(collect(data), vec![("k".to_owned(), b"a=b\nc=d".to_vec())]);
    }

    #[test]
    fn test_pax_binary_value() {
        // 24 = 2 (digits) + 1 (space) + 16 (key) + 1 (=) + 3 (value) + 1 (newline)
        let data = b"24 SCHILY.xattr.foo=\x00\x01\x02\n";
        let ext = PaxExtensions::new(data).next().unwrap().unwrap();
        assert_eq!(ext.key().unwrap(), "SCHILY.xattr.foo");
        assert_eq!(ext.value_bytes(), b"\x00\x01\x02");
    }

    #[test]
    fn test_pax_long_value() {
        let long_path = "a".repeat(200);
        let record = format!("210 path={long_path}\n");
        let records = collect(record.as_bytes());
        assert_eq!(records[0].1, long_path.as_bytes());
    }

    #[test]
    fn test_pax_length_overruns_data() {
        // The length counts 17 bytes, only 15 are present
        let mut iter = PaxExtensions::new(b"17 ctime=12345\n");
        let err = iter.next().unwrap().unwrap_err();
        assert!(matches!(err, PaxError::Malformed { offset: 0, .. }));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_pax_malformed_no_equals() {
        let data = b"14 pathfoobar\n";
        assert!(matches!(
            PaxExtensions::new(data).next(),
            Some(Err(PaxError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_pax_malformed_no_newline() {
        let data = b"12 uid=1000x";
        assert!(matches!(
            PaxExtensions::new(data).next(),
            Some(Err(PaxError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_pax_malformed_length() {
        assert!(PaxExtensions::new(b"x2 a=b\n").next().unwrap().is_err());
        assert!(PaxExtensions::new(b"nolength").next().unwrap().is_err());
        assert!(PaxExtensions::new(b"3 a\n").next().unwrap().is_err());
    }

    #[test]
    fn test_pax_error_offset_points_at_bad_record() {
        let data = b"12 uid=1000\n99 gid=1\n";
        let results: Vec<_> = PaxExtensions::new(data).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(PaxError::Malformed { offset: 12, .. })
        ));
    }

    #[test]
    fn test_pax_invalid_key() {
        let data = b"8 \xff\xfe=ab\n";
        let ext = PaxExtensions::new(data).next().unwrap().unwrap();
        assert!(matches!(ext.key(), Err(PaxError::InvalidKey(_))));
    }
}
