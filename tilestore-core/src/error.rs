//! Error types for pure tile addressing and format operations

/// Errors produced by partition math, key decoding and block format parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileError {
    /// Element coordinate outside the matrix extent
    IndexOutOfBounds,
    /// Tile size of zero on some axis
    InvalidTileSize,
    /// Storage key is not a well-formed block key
    MalformedKey,
    /// Buffer shorter than the structure being parsed
    InsufficientBuffer,
    /// Invalid payload header (bad magic)
    InvalidHeader,
    /// Payload version newer than this build understands
    UnsupportedFormat,
    /// Unknown data type tag
    UnsupportedDataType,
    /// Buffer length disagrees with the declared shape
    CorruptedData,
    /// Size computation would overflow
    ArraySizeOverflow,
}

impl core::fmt::Display for TileError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            TileError::IndexOutOfBounds => "Index out of bounds",
            TileError::InvalidTileSize => "Tile size must be positive",
            TileError::MalformedKey => "Malformed block key",
            TileError::InsufficientBuffer => "Insufficient buffer space",
            TileError::InvalidHeader => "Invalid block payload header",
            TileError::UnsupportedFormat => "Unsupported format version",
            TileError::UnsupportedDataType => "Unsupported data type tag",
            TileError::CorruptedData => "Data corruption detected",
            TileError::ArraySizeOverflow => "Array size overflow",
        };
        write!(f, "{msg}")
    }
}

impl core::error::Error for TileError {}

/// Result type for core tile operations
pub type Result<T> = core::result::Result<T, TileError>;
