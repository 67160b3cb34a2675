//! Fixed-width field decoding.
//!
//! Tar header fields are fixed-width byte ranges. String fields are padded
//! with NUL bytes; numeric fields are ASCII octal digit strings terminated by
//! a NUL or a space, optionally preceded by spaces.
//!
//! Numeric fields are decoded with [`parse_long_octal`]: a digit string short
//! enough to fit the classic unsigned 33-bit range is read as plain base-8,
//! anything longer is split into 8-digit chunks from the right, each chunk
//! worth 24 bits. This is *not* the GNU base-256 encoding; a field whose first
//! byte has the high bit set is rejected as invalid octal.

use crate::{HeaderError, Result};

/// Number of octal digits in one chunk of a long octal value.
const LONG_OCTAL_CHUNK: usize = 8;

/// Number of bits carried by one chunk of a long octal value.
const LONG_OCTAL_CHUNK_BITS: u32 = 24;

/// Longest digit string that is always decoded as plain octal.
const PLAIN_OCTAL_DIGITS: usize = 11;

/// Truncate a byte slice at the first null byte.
///
/// This is used to extract null-terminated strings from fixed-size fields.
/// If no null byte is found, returns the entire slice.
///
/// # Example
///
/// ```
/// use tar_cursor::truncate_null;
///
/// assert_eq!(truncate_null(b"hello\0world"), b"hello");
/// assert_eq!(truncate_null(b"no null here"), b"no null here");
/// assert_eq!(truncate_null(b"\0empty"), b"");
/// ```
#[must_use]
pub fn truncate_null(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

/// Extract the digit run of an octal field and validate it.
///
/// Leading spaces are skipped; the run ends at the first space or NUL.
fn octal_digits(bytes: &[u8]) -> Result<&[u8]> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\0')
        .map_or(bytes.len(), |i| start + i);

    let digits = &bytes[start..end];
    if digits.iter().any(|b| !(b'0'..=b'7').contains(b)) {
        return Err(HeaderError::InvalidOctal(bytes.to_vec()));
    }
    Ok(digits)
}

/// Fold validated octal digits into a value, failing on overflow.
fn fold_octal(digits: &[u8], field: &[u8]) -> Result<u64> {
    digits.iter().try_fold(0u64, |value, &byte| {
        value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| HeaderError::NumericOverflow(field.to_vec()))
    })
}

/// Parse an octal ASCII field into a u64.
///
/// - `"0000644\0"` -> 420 (file mode 0644)
/// - `"     123 "` -> 83
/// - an empty or all-NUL field -> 0
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] if the field contains anything other
/// than spaces, digits 0-7, or NUL bytes, and [`HeaderError::NumericOverflow`]
/// if the value does not fit in 64 bits.
pub fn parse_octal(bytes: &[u8]) -> Result<u64> {
    let digits = octal_digits(bytes)?;
    fold_octal(digits, bytes)
}

/// Whether a digit string (leading zeros removed) fits the classic range.
///
/// That is fewer than 11 digits, or exactly 11 with a leading digit of 1-3.
fn fits_plain_octal(digits: &[u8]) -> bool {
    digits.len() < PLAIN_OCTAL_DIGITS
        || (digits.len() == PLAIN_OCTAL_DIGITS && (b'1'..=b'3').contains(&digits[0]))
}

/// Parse an octal field that may carry a value beyond the classic range.
///
/// Values in the unsigned 33-bit range are plain base-8. Longer digit strings
/// are split from the right into 8-digit chunks; the chunk at index `i`
/// (counting from the right, starting at zero) is scaled by `2^(24 * i)` and
/// all chunks are summed. A shorter leftover chunk at the left end is scaled
/// the same way.
///
/// # Example
///
/// ```
/// use tar_cursor::parse_long_octal;
///
/// assert_eq!(parse_long_octal(b"00000001750\0").unwrap(), 1000);
/// assert_eq!(parse_long_octal(b"100000000000").unwrap(), 1 << 33);
/// ```
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] for non-octal characters and
/// [`HeaderError::NumericOverflow`] if the value exceeds 128 bits.
pub fn parse_long_octal(bytes: &[u8]) -> Result<u128> {
    let digits = octal_digits(bytes)?;
    let significant = digits
        .iter()
        .position(|&b| b != b'0')
        .map_or(&digits[digits.len()..], |i| &digits[i..]);

    if fits_plain_octal(significant) {
        return fold_octal(significant, bytes).map(u128::from);
    }

    let overflow = || HeaderError::NumericOverflow(bytes.to_vec());
    let mut value: u128 = 0;
    for (index, chunk) in significant.rchunks(LONG_OCTAL_CHUNK).enumerate() {
        let part = u128::from(fold_octal(chunk, bytes)?);
        let shift = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(LONG_OCTAL_CHUNK_BITS))
            .ok_or_else(overflow)?;
        let scale = 1u128.checked_shl(shift).ok_or_else(overflow)?;
        value = part
            .checked_mul(scale)
            .and_then(|scaled| value.checked_add(scaled))
            .ok_or_else(overflow)?;
    }
    Ok(value)
}

/// Parse a numeric header field into a u64 using the long octal scheme.
///
/// # Errors
///
/// Fails like [`parse_long_octal`], and with [`HeaderError::NumericOverflow`]
/// if the decoded value does not fit in 64 bits.
pub fn parse_numeric(bytes: &[u8]) -> Result<u64> {
    let value = parse_long_octal(bytes)?;
    u64::try_from(value).map_err(|_| HeaderError::NumericOverflow(bytes.to_vec()))
}
