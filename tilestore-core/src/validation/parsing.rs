//! Parsing utilities for tile storage key strings
//!
//! Pure parsing functions with no I/O dependencies, used when reversing
//! stored object names back into block coordinates.

use crate::TileError;

/// Parse exactly `N` unsigned decimal fields separated by `separator`
///
/// Fails with [`TileError::MalformedKey`] on a wrong field count, an empty
/// field or any non-digit byte (signs included).
pub fn parse_fields<const N: usize>(input: &str, separator: char) -> Result<[usize; N], TileError> {
    let mut fields = [0usize; N];
    let mut count = 0;

    for part in input.split(separator) {
        if count >= N {
            return Err(TileError::MalformedKey);
        }
        fields[count] = parse_usize(part)?;
        count += 1;
    }

    if count != N {
        return Err(TileError::MalformedKey);
    }

    Ok(fields)
}

/// Parse a usize from a string with error handling
///
/// Only plain ASCII digits are accepted.
pub fn parse_usize(s: &str) -> Result<usize, TileError> {
    if s.is_empty() {
        return Err(TileError::MalformedKey);
    }

    let mut result: usize = 0;

    for byte in s.bytes() {
        if !byte.is_ascii_digit() {
            return Err(TileError::MalformedKey);
        }

        let digit = (byte - b'0') as usize;

        // Check for overflow
        if result > (usize::MAX - digit) / 10 {
            return Err(TileError::ArraySizeOverflow);
        }

        result = result * 10 + digit;
    }

    Ok(result)
}
