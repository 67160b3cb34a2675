//! Sequential archive reading with continuation records merged away.
//!
//! [`TarReader`] is a cursor over a forward-only byte stream. The caller
//! alternates [`TarReader::read_header`] and [`TarReader::read_data`]:
//!
//! - **GNU long name (type 'L')** and **long link (type 'K')** bodies replace
//!   the path or link target of the entry that follows
//! - **PAX extended headers (type 'x')** inject key/value records into the
//!   entry that follows, overriding same-named fields
//! - **PAX global headers (type 'g')** apply to every later entry
//! - **GNU directory markers (type 'D')** decode as directories
//! - **GNU sparse markers (type 'S')** are reported with a warning; their body
//!   is the stored data, not the reconstructed file
//!
//! Continuation records are never returned as entries.
//!
//! # Body obligations
//!
//! Each entry's body must be consumed with [`TarReader::read_data`] or
//! [`TarReader::skip_data`] before the next header is requested. When it is
//! not, the next `read_header` only advances past the final block of the
//! unread body: this is enough for bodies shorter than 512 bytes and leaves
//! the stream misaligned for anything longer.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use tar_cursor::stream::{Limits, TarReader};
//!
//! // An empty archive is two zero blocks.
//! let mut reader = TarReader::new(Cursor::new(vec![0u8; 1024]), Limits::default());
//! assert!(reader.read_header().unwrap().is_none());
//! ```

mod error;
mod limits;
mod reader;

pub use error::{Result, StreamError};
pub use limits::Limits;
pub use reader::TarReader;
