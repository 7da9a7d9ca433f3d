//! Self-describing binary encoding for numeric tile arrays
//!
//! A payload is a [`PayloadHeader`], `ndim` little-endian u64 dimensions and
//! the raw little-endian element buffer in row-major order. Any rank is
//! accepted; matrices use two.

use alloc::vec::Vec;

use super::constants::payload::DIM_SIZE;
use super::header::{DataType, PayloadHeader};
use crate::traits::MatrixElement;
use crate::validation::{checked_byte_size, checked_element_count, validate_array_bounds};
use crate::{Result, TileError};

/// Borrowed view over a decoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadView<'a> {
    pub header: PayloadHeader,
    pub dims: Vec<usize>,
    /// Raw little-endian element bytes
    pub data: &'a [u8],
}

impl PayloadView<'_> {
    pub fn data_type(&self) -> DataType {
        // from_bytes already rejected unknown tags
        DataType::from_u8(self.header.data_type).unwrap_or(DataType::F64)
    }

    pub fn element_count(&self) -> usize {
        self.data.len() / self.data_type().size_bytes()
    }
}

/// Encode a typed array of the given dimensions
pub fn encode_elements<T: MatrixElement>(dims: &[usize], values: &[T]) -> Result<Vec<u8>> {
    if checked_element_count(dims)? != values.len() {
        return Err(TileError::CorruptedData);
    }
    let ndim = u32::try_from(dims.len()).map_err(|_| TileError::ArraySizeOverflow)?;
    let header = PayloadHeader::new(T::data_type(), ndim);

    let data_size = checked_byte_size(values.len(), T::size_bytes())?;
    let mut out = Vec::with_capacity(PayloadHeader::SIZE + dims.len() * DIM_SIZE + data_size);
    out.extend_from_slice(&header.to_bytes());
    for &dim in dims {
        out.extend_from_slice(&(dim as u64).to_le_bytes());
    }

    let start = out.len();
    out.extend_from_slice(bytemuck::cast_slice(values));
    if cfg!(target_endian = "big") {
        swap_element_bytes(&mut out[start..], T::size_bytes());
    }

    Ok(out)
}

/// Parse a payload without copying the element buffer
pub fn decode_payload(bytes: &[u8]) -> Result<PayloadView<'_>> {
    let header = PayloadHeader::from_bytes(bytes)?;
    let data_type = header.data_type().ok_or(TileError::UnsupportedDataType)?;

    let ndim = header.ndim as usize;
    let dims_end = PayloadHeader::SIZE + ndim * DIM_SIZE;
    if bytes.len() < dims_end {
        return Err(TileError::InsufficientBuffer);
    }

    let mut dims = Vec::with_capacity(ndim);
    for chunk in bytes[PayloadHeader::SIZE..dims_end].chunks_exact(DIM_SIZE) {
        let mut raw = [0u8; DIM_SIZE];
        raw.copy_from_slice(chunk);
        let dim = usize::try_from(u64::from_le_bytes(raw)).map_err(|_| TileError::ArraySizeOverflow)?;
        dims.push(dim);
    }

    let data = &bytes[dims_end..];
    let count = validate_array_bounds(data.len(), data_type.size_bytes())?;
    if count != checked_element_count(&dims)? {
        return Err(TileError::CorruptedData);
    }

    Ok(PayloadView { header, dims, data })
}

/// Copy the element buffer of a payload into a typed vector
///
/// The payload's data type must be exactly `T`'s.
pub fn decode_elements<T: MatrixElement>(view: &PayloadView<'_>) -> Result<Vec<T>> {
    if view.data_type() != T::data_type() {
        return Err(TileError::CorruptedData);
    }
    if cfg!(target_endian = "big") {
        let mut raw = view.data.to_vec();
        swap_element_bytes(&mut raw, T::size_bytes());
        Ok(bytemuck::pod_collect_to_vec(&raw))
    } else {
        Ok(bytemuck::pod_collect_to_vec(view.data))
    }
}

fn swap_element_bytes(bytes: &mut [u8], element_size: usize) {
    for element in bytes.chunks_exact_mut(element_size) {
        element.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_payload_preserves_bits() {
        let values = [0.1f64, -0.0, f64::NAN, f64::INFINITY, 1e-300, 42.0];
        let bytes = encode_elements(&[2, 3], &values).unwrap();
        let view = decode_payload(&bytes).unwrap();
        assert_eq!(view.dims, vec![2, 3]);
        assert_eq!(view.data_type(), DataType::F64);
        assert_eq!(view.element_count(), 6);

        let decoded: Vec<f64> = decode_elements(&view).unwrap();
        let original_bits: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
        let decoded_bits: Vec<u64> = decoded.iter().map(|v| v.to_bits()).collect();
        assert_eq!(original_bits, decoded_bits);
    }

    #[test]
    fn test_payload_arbitrary_rank() {
        let values: Vec<u32> = (0..24).collect();
        let bytes = encode_elements(&[2, 3, 4], &values).unwrap();
        let view = decode_payload(&bytes).unwrap();
        assert_eq!(view.dims, vec![2, 3, 4]);
        assert_eq!(decode_elements::<u32>(&view).unwrap(), values);

        let scalar = encode_elements::<i64>(&[], &[7]).unwrap();
        let view = decode_payload(&scalar).unwrap();
        assert!(view.dims.is_empty());
        assert_eq!(decode_elements::<i64>(&view).unwrap(), vec![7]);
    }

    #[test]
    fn test_payload_layout_is_little_endian() {
        let bytes = encode_elements::<i32>(&[1, 1], &[0x0102_0304]).unwrap();
        assert_eq!(bytes.len(), PayloadHeader::SIZE + 2 * DIM_SIZE + 4);
        assert_eq!(&bytes[bytes.len() - 4..], &[4, 3, 2, 1]);
    }

    #[test]
    fn test_payload_rejects_inconsistent_input() {
        assert_eq!(
            encode_elements::<f32>(&[2, 2], &[1.0, 2.0, 3.0]),
            Err(TileError::CorruptedData)
        );

        let mut bytes = encode_elements::<f32>(&[2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        bytes.pop();
        assert_eq!(decode_payload(&bytes), Err(TileError::CorruptedData));

        let bytes = encode_elements::<f32>(&[4], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(
            decode_payload(&bytes[..PayloadHeader::SIZE + 3]),
            Err(TileError::InsufficientBuffer)
        );

        let view = decode_payload(&bytes).unwrap();
        assert_eq!(decode_elements::<i32>(&view), Err(TileError::CorruptedData));
    }
}
