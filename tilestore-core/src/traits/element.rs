//! Matrix element type constraints
//!
//! This module defines the trait that constrains what types can be
//! stored inside matrix tiles.

use crate::format::DataType;

/// Trait for types that can be stored as matrix elements
///
/// Element types must be plain old data so tiles can be reinterpreted as
/// bytes without copying element by element. Each type maps to exactly one
/// [`DataType`] tag, which is what makes a payload self-describing.
pub trait MatrixElement:
    bytemuck::Pod + PartialEq + Default + core::fmt::Debug + Send + Sync + 'static
{
    /// Get the DataType tag for this element type
    fn data_type() -> DataType;

    /// Get the size in bytes of this element type
    fn size_bytes() -> usize {
        core::mem::size_of::<Self>()
    }
}

macro_rules! impl_matrix_element {
    ($type:ty, $variant:ident) => {
        impl MatrixElement for $type {
            fn data_type() -> DataType {
                DataType::$variant
            }
        }
    };
}

impl_matrix_element!(f32, F32);
impl_matrix_element!(f64, F64);
impl_matrix_element!(i32, I32);
impl_matrix_element!(i64, I64);
impl_matrix_element!(u32, U32);
impl_matrix_element!(u64, U64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_tags() {
        assert_eq!(f32::size_bytes(), f32::data_type().size_bytes());
        assert_eq!(f64::size_bytes(), f64::data_type().size_bytes());
        assert_eq!(i32::size_bytes(), i32::data_type().size_bytes());
        assert_eq!(i64::size_bytes(), i64::data_type().size_bytes());
        assert_eq!(u32::size_bytes(), u32::data_type().size_bytes());
        assert_eq!(u64::size_bytes(), u64::data_type().size_bytes());
    }
}
