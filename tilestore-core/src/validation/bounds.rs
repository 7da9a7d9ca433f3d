//! Array size validation for tile payloads
//!
//! Pure arithmetic checks with overflow protection and no I/O.

use crate::TileError;

/// Number of elements of `element_size` bytes in a buffer of `byte_len`
///
/// The length must be an exact multiple of the element size.
pub const fn validate_array_bounds(byte_len: usize, element_size: usize) -> Result<usize, TileError> {
    if element_size == 0 || byte_len % element_size != 0 {
        return Err(TileError::CorruptedData);
    }

    let count = byte_len / element_size;

    // Reject arrays too large for downstream index arithmetic
    if count > isize::MAX as usize {
        return Err(TileError::ArraySizeOverflow);
    }

    Ok(count)
}

/// Product of all dimensions, failing on overflow
pub fn checked_element_count(dims: &[usize]) -> Result<usize, TileError> {
    dims.iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or(TileError::ArraySizeOverflow)
}

/// Byte length of `count` elements of `element_size` bytes
pub const fn checked_byte_size(count: usize, element_size: usize) -> Result<usize, TileError> {
    match count.checked_mul(element_size) {
        Some(size) => Ok(size),
        None => Err(TileError::ArraySizeOverflow),
    }
}
