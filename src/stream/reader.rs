//! The sequential header/body cursor.

use std::io::{ErrorKind, Read};

use log::{debug, trace, warn};

use crate::entry::{Extensions, ParsedEntry};
use crate::header::{EntryType, Header};
use crate::octal::truncate_null;
use crate::pax::PaxExtensions;
use crate::{BLOCK_SIZE, HEADER_SIZE};

use super::error::{Result, StreamError};
use super::limits::Limits;

/// Upper bound on the allocation made up front for a body.
const MAX_PREALLOC: usize = 1024 * 1024;

/// A continuation record waiting for the entry it describes.
#[derive(Debug)]
enum Continuation {
    LongName(Vec<u8>),
    LongLink(Vec<u8>),
    Pax(Vec<(String, Vec<u8>)>),
}

/// Forward-only tar decoder over any [`Read`] implementation.
///
/// The reader holds the session state: the position in the stream, the most
/// recent logical header, and whether the padding after that header's body
/// has been consumed yet. Each instance is independent; nothing is shared.
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use tar_cursor::stream::{Limits, TarReader};
///
/// let file = File::open("archive.tar").unwrap();
/// let mut reader = TarReader::new(BufReader::new(file), Limits::strict());
///
/// while let Some(entry) = reader.read_header().unwrap() {
///     if entry.is_file() {
///         let data = reader.read_data().unwrap();
///         println!("{}: {} bytes", entry.path_lossy(), data.len());
///     } else {
///         reader.skip_data().unwrap();
///     }
/// }
/// ```
#[derive(Debug)]
pub struct TarReader<R> {
    reader: R,
    limits: Limits,
    /// The most recent logical header, continuation headers included.
    last_header: Option<ParsedEntry>,
    /// Whether the body padding of `last_header` is still in the stream.
    padding_pending: bool,
    /// Records from PAX global headers seen so far.
    globals: Extensions,
    /// Bytes consumed from `reader`.
    pos: u64,
    /// End-of-archive marker seen.
    finished: bool,
    /// A fatal error occurred.
    poisoned: bool,
}

impl<R: Read> TarReader<R> {
    /// Create a reader over a stream positioned at the start of an archive.
    pub fn new(reader: R, limits: Limits) -> Self {
        Self {
            reader,
            limits,
            last_header: None,
            padding_pending: false,
            globals: Extensions::default(),
            pos: 0,
            finished: false,
            poisoned: false,
        }
    }

    /// Create a reader with default limits.
    pub fn with_defaults(reader: R) -> Self {
        Self::new(reader, Limits::default())
    }

    /// Number of bytes consumed from the underlying stream.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// The most recently decoded header.
    #[must_use]
    pub fn last_header(&self) -> Option<&ParsedEntry> {
        self.last_header.as_ref()
    }

    /// Records collected from PAX global headers.
    #[must_use]
    pub fn global_extensions(&self) -> &Extensions {
        &self.globals
    }

    /// Get the current limits.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Get a mutable reference to the underlying reader.
    ///
    /// A caller that reads an entry's body through this must read exactly
    /// `size` bytes and then call [`TarReader::skip_padding`]. Bytes read this
    /// way are not counted by [`TarReader::position`].
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume the decoder and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decode the next entry's header, merging any continuation records.
    ///
    /// Returns `Ok(None)` once the end-of-archive marker (a zero block,
    /// followed by its paired zero block) has been consumed; after that no
    /// further reads are made.
    ///
    /// # Errors
    ///
    /// Fails with [`StreamError::StreamExhausted`] on a short read, with
    /// [`StreamError::Header`] on a corrupt block, and with the limit errors
    /// when continuation records exceed [`Limits`].
    pub fn read_header(&mut self) -> Result<Option<ParsedEntry>> {
        self.check_usable()?;
        let result = self.next_entry();
        self.track(result)
    }

    /// Read the whole body of the current entry, then its block padding.
    ///
    /// # Errors
    ///
    /// Fails with [`StreamError::NoCurrentEntry`] before the first header,
    /// with [`StreamError::DataAlreadyConsumed`] if the body was already read
    /// or skipped, and with [`StreamError::StreamExhausted`] on a short read.
    pub fn read_data(&mut self) -> Result<Vec<u8>> {
        self.check_usable()?;
        let result = self.read_body();
        self.track(result)
    }

    /// Discard the body of the current entry and its padding without
    /// buffering it. Does nothing if the body was already consumed.
    ///
    /// # Errors
    ///
    /// Fails with [`StreamError::NoCurrentEntry`] before the first header and
    /// with [`StreamError::StreamExhausted`] on a short read.
    pub fn skip_data(&mut self) -> Result<()> {
        self.check_usable()?;
        let result = self.skip_body();
        self.track(result)
    }

    /// Consume the padding that realigns the stream after the current body.
    ///
    /// Only for callers that read the body through [`TarReader::get_mut`];
    /// [`TarReader::read_data`] and [`TarReader::skip_data`] do this already.
    ///
    /// # Errors
    ///
    /// Fails with [`StreamError::StreamExhausted`] on a short read.
    pub fn skip_padding(&mut self) -> Result<()> {
        self.check_usable()?;
        let result = self.consume_padding();
        self.track(result)
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(StreamError::Poisoned);
        }
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() {
                debug!("aborting decode at position {}: {err}", self.pos);
                self.poisoned = true;
            }
        }
        result
    }

    fn next_entry(&mut self) -> Result<Option<ParsedEntry>> {
        if self.finished {
            return Ok(None);
        }

        let mut pending = Vec::new();
        let mut records = 0usize;
        loop {
            let Some(entry) = self.next_block_header()? else {
                if !pending.is_empty() {
                    return Err(StreamError::OrphanedMetadata);
                }
                return Ok(None);
            };

            match entry.entry_type {
                EntryType::GnuLongName => {
                    pending.push(Continuation::LongName(self.read_gnu_long(&entry)?));
                }
                EntryType::GnuLongLink => {
                    pending.push(Continuation::LongLink(self.read_gnu_long(&entry)?));
                }
                EntryType::XHeader => {
                    pending.push(Continuation::Pax(self.read_pax_records(&entry)?));
                }
                EntryType::XGlobalHeader => {
                    for (key, value) in self.read_pax_records(&entry)? {
                        self.globals.insert(key, value);
                    }
                }
                _ => {
                    if entry.is_sparse() {
                        warn!(
                            "{}: GNU sparse entries are not reconstructed, body is the stored data",
                            entry.path_lossy()
                        );
                    }
                    let entry = self.resolve(entry, pending)?;
                    self.last_header = Some(entry.clone());
                    return Ok(Some(entry));
                }
            }

            records += 1;
            if records > self.limits.max_pending_entries {
                return Err(StreamError::TooManyPendingEntries {
                    count: records,
                    limit: self.limits.max_pending_entries,
                });
            }
        }
    }

    /// Read and decode one header block, without continuation handling.
    ///
    /// Returns `None` at the end-of-archive marker.
    fn next_block_header(&mut self) -> Result<Option<ParsedEntry>> {
        self.skip_unread_tail()?;

        let start = self.pos;
        let mut block = [0u8; HEADER_SIZE];
        self.read_full(&mut block)?;
        let header = Header::from_bytes_exact(&block);

        if header.is_empty() {
            let mut terminator = [0u8; HEADER_SIZE];
            match self.read_up_to(&mut terminator)? {
                0 => debug!("archive ends at {start} after a single zero block"),
                HEADER_SIZE => debug!("end-of-archive marker at {start}"),
                got => {
                    return Err(StreamError::StreamExhausted {
                        pos: start + HEADER_SIZE as u64,
                        expected: HEADER_SIZE,
                        got,
                    })
                }
            }
            self.finished = true;
            return Ok(None);
        }

        let entry = header
            .decode()
            .map_err(|source| StreamError::Header { pos: start, source })?;
        trace!(
            "header at {start}: {:?} {:?} ({} bytes)",
            entry.entry_type,
            entry.path_lossy(),
            entry.size
        );

        self.last_header = Some(entry.clone());
        self.padding_pending = true;
        Ok(Some(entry))
    }

    fn resolve(&self, mut entry: ParsedEntry, pending: Vec<Continuation>) -> Result<ParsedEntry> {
        for (key, value) in self.globals.iter() {
            entry.apply_pax(key, value);
        }

        // Nearest record first, so the earliest one in the stream wins.
        for record in pending.into_iter().rev() {
            match record {
                Continuation::LongName(name) => entry.path = name,
                Continuation::LongLink(link) => entry.linkpath = link,
                Continuation::Pax(records) => {
                    for (key, value) in &records {
                        entry.apply_pax(key, value);
                    }
                }
            }
        }

        self.check_path_len(entry.path.len())?;
        self.check_path_len(entry.linkpath.len())?;
        Ok(entry)
    }

    fn read_gnu_long(&mut self, header: &ParsedEntry) -> Result<Vec<u8>> {
        if header.size > self.limits.max_gnu_long_size {
            return Err(StreamError::GnuLongTooLarge {
                size: header.size,
                limit: self.limits.max_gnu_long_size,
            });
        }

        let data = self.read_body()?;
        let name = truncate_null(&data).to_vec();
        self.check_path_len(name.len())?;
        debug!(
            "GNU {:?} record: {:?}",
            header.entry_type,
            String::from_utf8_lossy(&name)
        );
        Ok(name)
    }

    fn read_pax_records(&mut self, header: &ParsedEntry) -> Result<Vec<(String, Vec<u8>)>> {
        if header.size > self.limits.max_pax_size {
            return Err(StreamError::PaxTooLarge {
                size: header.size,
                limit: self.limits.max_pax_size,
            });
        }

        let data = self.read_body()?;
        let records = PaxExtensions::new(&data)
            .map(|ext| -> Result<(String, Vec<u8>)> {
                let ext = ext?;
                Ok((ext.key()?.to_owned(), ext.value_bytes().to_vec()))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "PAX {:?} record with {} keys",
            header.entry_type,
            records.len()
        );
        Ok(records)
    }

    fn check_path_len(&self, len: usize) -> Result<()> {
        if len > self.limits.max_path_len {
            return Err(StreamError::PathTooLong {
                len,
                limit: self.limits.max_path_len,
            });
        }
        Ok(())
    }

    fn current_size(&self) -> u64 {
        self.last_header.as_ref().map_or(0, |h| h.size)
    }

    /// Read the body of `last_header` block by block into one buffer.
    fn read_body(&mut self) -> Result<Vec<u8>> {
        let size = self
            .last_header
            .as_ref()
            .ok_or(StreamError::NoCurrentEntry)?
            .size;
        if !self.padding_pending {
            return Err(StreamError::DataAlreadyConsumed);
        }
        let len = usize::try_from(size).map_err(|_| StreamError::InvalidSize(size))?;

        let mut data = Vec::with_capacity(len.min(MAX_PREALLOC));
        let mut block = [0u8; BLOCK_SIZE];
        let mut remaining = len;
        while remaining >= BLOCK_SIZE {
            self.read_full(&mut block)?;
            data.extend_from_slice(&block);
            remaining -= BLOCK_SIZE;
        }
        if remaining > 0 {
            let tail = &mut block[..remaining];
            self.read_full(tail)?;
            data.extend_from_slice(tail);
        }
        trace!("read {len} body bytes");

        self.consume_padding()?;
        Ok(data)
    }

    fn skip_body(&mut self) -> Result<()> {
        let size = self
            .last_header
            .as_ref()
            .ok_or(StreamError::NoCurrentEntry)?
            .size;
        if !self.padding_pending {
            return Ok(());
        }
        self.discard(size)?;
        self.consume_padding()
    }

    fn consume_padding(&mut self) -> Result<()> {
        if !self.padding_pending {
            return Ok(());
        }
        let size = self.current_size();
        let tail = size % BLOCK_SIZE as u64;
        if tail != 0 {
            self.discard(BLOCK_SIZE as u64 - tail)?;
        }
        self.padding_pending = false;
        Ok(())
    }

    /// Realign before a header when the previous body was never consumed.
    ///
    /// Only the final block of the body is skipped. That covers bodies under
    /// one block; longer bodies leave the stream misaligned.
    fn skip_unread_tail(&mut self) -> Result<()> {
        if !self.padding_pending {
            return Ok(());
        }
        let size = self.current_size();
        if size >= BLOCK_SIZE as u64 {
            warn!(
                "body of {size} bytes at {} was not consumed; only its final block is skipped",
                self.pos
            );
        }
        if size % BLOCK_SIZE as u64 != 0 {
            self.discard(BLOCK_SIZE as u64)?;
        }
        self.padding_pending = false;
        Ok(())
    }

    fn discard(&mut self, len: u64) -> Result<()> {
        let mut remaining = len;
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            self.read_full(&mut buf[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(())
    }

    /// Fill `buf` completely or fail with [`StreamError::StreamExhausted`].
    fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos;
        let got = self.read_up_to(buf)?;
        if got < buf.len() {
            return Err(StreamError::StreamExhausted {
                pos: start,
                expected: buf.len(),
                got,
            });
        }
        Ok(())
    }

    /// Read until `buf` is full or the stream ends; returns the byte count.
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.reader.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += total as u64;
        Ok(total)
    }
}
