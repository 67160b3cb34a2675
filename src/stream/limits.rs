//! Resource limits applied while decoding.

/// Bounds on what a single archive may make the reader allocate or loop over.
///
/// Continuation bodies (GNU long names, PAX records) are buffered in full, and
/// chained continuation records are resolved by a loop, so all of them are
/// capped.
///
/// # Example
///
/// ```
/// use tar_cursor::Limits;
///
/// let limits = Limits {
///     max_path_len: 1024,
///     ..Default::default()
/// };
/// assert_eq!(limits.max_pending_entries, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum length in bytes of a resolved path or link target.
    ///
    /// Default: 4096 bytes (Linux PATH_MAX).
    pub max_path_len: usize,

    /// Maximum declared size of a PAX (`'x'` or `'g'`) body.
    ///
    /// Default: 1 MiB.
    pub max_pax_size: u64,

    /// Maximum declared size of a GNU long name or long link body.
    ///
    /// Default: 4096 bytes.
    pub max_gnu_long_size: u64,

    /// Maximum number of continuation records preceding one real entry.
    ///
    /// Default: 16.
    pub max_pending_entries: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_path_len: 4096,
            max_pax_size: 1024 * 1024,
            max_gnu_long_size: 4096,
            max_pending_entries: 16,
        }
    }
}

impl Limits {
    /// Create a new `Limits` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits that effectively disable every check. For trusted archives only.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_path_len: usize::MAX,
            max_pax_size: u64::MAX,
            max_gnu_long_size: u64::MAX,
            max_pending_entries: usize::MAX,
        }
    }

    /// Conservative limits for untrusted archives.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_path_len: 1024,
            max_pax_size: 64 * 1024,
            max_gnu_long_size: 1024,
            max_pending_entries: 4,
        }
    }
}
