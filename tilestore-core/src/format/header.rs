//! Header definitions: the persisted matrix header record and the fixed
//! header that opens every block payload.

use super::constants::payload::{FIXED_HEADER_SIZE, MAGIC, MAX_NDIM, VERSION};
use crate::TileError;

/// Persisted description of a tiled matrix
///
/// Stored as a small record next to the tiles and rewritten on every open.
/// With the `serde` feature it serializes as
/// `{"shape":[rows,cols],"shard_sizes":[tile_h,tile_w]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatrixHeader {
    /// Logical matrix shape (rows, cols)
    pub shape: (usize, usize),
    /// Tile shape (tile height, tile width)
    #[cfg_attr(feature = "serde", serde(rename = "shard_sizes"))]
    pub tile_shape: (usize, usize),
}

impl MatrixHeader {
    pub const fn new(shape: (usize, usize), tile_shape: (usize, usize)) -> Self {
        Self { shape, tile_shape }
    }

    /// Both extents and both tile sizes are positive
    pub const fn is_valid(&self) -> bool {
        self.shape.0 > 0 && self.shape.1 > 0 && self.tile_shape.0 > 0 && self.tile_shape.1 > 0
    }

    /// Square extent with square tiles
    pub const fn is_square(&self) -> bool {
        self.shape.0 == self.shape.1 && self.tile_shape.0 == self.tile_shape.1
    }
}

/// Fixed-size header that opens every block payload
///
/// Layout (little-endian): magic (4) | version (1) | dtype (1) |
/// reserved (2) | ndim (4), followed by `ndim` u64 dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Magic bytes: "TILE"
    pub magic: [u8; 4],
    /// Format version
    pub version: u8,
    /// Element data type tag
    pub data_type: u8,
    /// Reserved for future flags
    pub reserved: u16,
    /// Number of dimensions that follow
    pub ndim: u32,
}

impl PayloadHeader {
    /// Size of the fixed part in bytes
    pub const SIZE: usize = FIXED_HEADER_SIZE;

    /// Create a header for an array of `ndim` dimensions
    pub const fn new(data_type: DataType, ndim: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            data_type: data_type.to_u8(),
            reserved: 0,
            ndim,
        }
    }

    /// Validate magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.version <= VERSION
    }

    /// Parse the fixed header from the start of a payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TileError> {
        if bytes.len() < Self::SIZE {
            return Err(TileError::InsufficientBuffer);
        }

        if bytes[0..4] != MAGIC {
            return Err(TileError::InvalidHeader);
        }

        let version = bytes[4];
        if version > VERSION {
            return Err(TileError::UnsupportedFormat);
        }

        let data_type = bytes[5];
        if DataType::from_u8(data_type).is_none() {
            return Err(TileError::UnsupportedDataType);
        }

        let reserved = u16::from_le_bytes([bytes[6], bytes[7]]);
        let ndim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if ndim > MAX_NDIM {
            return Err(TileError::CorruptedData);
        }

        Ok(Self {
            magic: MAGIC,
            version,
            data_type,
            reserved,
            ndim,
        })
    }

    /// Convert header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5] = self.data_type;
        bytes[6..8].copy_from_slice(&self.reserved.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.ndim.to_le_bytes());
        bytes
    }

    /// Decoded data type; valid for any header produced by `from_bytes`
    pub fn data_type(&self) -> Option<DataType> {
        DataType::from_u8(self.data_type)
    }
}

/// Element data types a tile may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DataType {
    /// 32-bit floating point
    F32 = 0,
    /// 64-bit floating point
    F64 = 1,
    /// 32-bit signed integer
    I32 = 2,
    /// 64-bit signed integer
    I64 = 3,
    /// 32-bit unsigned integer
    U32 = 4,
    /// 64-bit unsigned integer
    U64 = 5,
}

impl DataType {
    /// Convert from u8 representation
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DataType::F32),
            1 => Some(DataType::F64),
            2 => Some(DataType::I32),
            3 => Some(DataType::I64),
            4 => Some(DataType::U32),
            5 => Some(DataType::U64),
            _ => None,
        }
    }

    /// Convert to u8 representation
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the size in bytes for this data type
    pub const fn size_bytes(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DataType::F32 => write!(f, "f32"),
            DataType::F64 => write!(f, "f64"),
            DataType::I32 => write!(f, "i32"),
            DataType::I64 => write!(f, "i64"),
            DataType::U32 => write!(f, "u32"),
            DataType::U64 => write!(f, "u64"),
        }
    }
}
