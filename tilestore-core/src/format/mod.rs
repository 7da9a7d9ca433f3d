//! Binary and record format definitions
//!
//! Pure data structure definitions for the matrix header record and the
//! block payload wire format. No I/O.

pub mod constants;
pub mod header;
#[cfg(feature = "alloc")]
pub mod payload;

pub use header::{DataType, MatrixHeader, PayloadHeader};
#[cfg(feature = "alloc")]
pub use payload::{decode_elements, decode_payload, encode_elements, PayloadView};
