//! Error types for sequential archive decoding.

use thiserror::Error;

use crate::{HeaderError, PaxError};

/// Errors that can occur while reading an archive.
///
/// Everything except caller misuse ([`StreamError::NoCurrentEntry`],
/// [`StreamError::DataAlreadyConsumed`]) is fatal: the reader refuses further
/// work and answers with [`StreamError::Poisoned`].
#[derive(Debug, Error)]
pub enum StreamError {
    /// I/O error from the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header decoding error (checksum, invalid octal, etc.).
    #[error("header error at position {pos}: {source}")]
    Header {
        /// Position of the offending header block.
        pos: u64,
        /// The decoding failure.
        #[source]
        source: HeaderError,
    },

    /// PAX extended header parsing error.
    #[error("PAX error: {0}")]
    Pax(#[from] PaxError),

    /// The stream ended in the middle of a fixed-size read.
    #[error("stream exhausted at position {pos}: wanted {expected} bytes, got {got}")]
    StreamExhausted {
        /// Position where the short read started.
        pos: u64,
        /// Bytes requested.
        expected: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// Path or link target exceeds the configured maximum length.
    #[error("path exceeds limit: {len} bytes > {limit} bytes")]
    PathTooLong {
        /// Actual path length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// PAX extended header exceeds the configured maximum size.
    #[error("PAX header exceeds limit: {size} bytes > {limit} bytes")]
    PaxTooLarge {
        /// Declared PAX body size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// GNU long name/link exceeds the configured maximum size.
    #[error("GNU long name/link exceeds limit: {size} bytes > {limit} bytes")]
    GnuLongTooLarge {
        /// Declared body size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Continuation records were followed by the end of the archive.
    #[error("continuation records without a following entry")]
    OrphanedMetadata,

    /// Too many consecutive continuation records before a real entry.
    #[error("too many chained continuation records: {count} > {limit}")]
    TooManyPendingEntries {
        /// Number of continuation records seen.
        count: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Entry size cannot be represented in memory or padded.
    #[error("invalid entry size: {0}")]
    InvalidSize(u64),

    /// `read_data` was called before any header was read.
    #[error("no entry header has been read")]
    NoCurrentEntry,

    /// The body of the current entry was already read or skipped.
    #[error("entry data already consumed")]
    DataAlreadyConsumed,

    /// A previous fatal error aborted this decode session.
    #[error("reader unusable after an earlier fatal error")]
    Poisoned,
}

impl StreamError {
    /// Whether this error aborts the decode session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StreamError::NoCurrentEntry | StreamError::DataAlreadyConsumed
        )
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
