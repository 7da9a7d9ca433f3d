//! Error types for tiled matrix operations

use thiserror::Error;
use tilestore_core::{DataType, TileError};

use crate::store::StoreError;

/// Errors surfaced by matrix, store and region operations
#[derive(Debug, Error)]
pub enum MatrixError {
    /// No header is stored and the caller supplied no shape or tile shape
    #[error("header doesn't exist and no shape/tile shape provided for matrix '{key}'")]
    MissingSchema {
        /// Matrix key
        key: String,
    },

    /// Shape or tile shape unusable for this matrix kind
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Element or row coordinate outside the matrix
    #[error("index {index} out of bounds for axis {axis} with extent {extent}")]
    OutOfBounds {
        /// Axis (0 = rows, 1 = cols)
        axis: usize,
        /// Requested index
        index: usize,
        /// Axis extent
        extent: usize,
    },

    /// Block index outside the tile grid
    #[error("block ({bx}, {by}) outside tile grid {grid:?}")]
    BlockIndexOutOfRange {
        bx: usize,
        by: usize,
        /// Tile counts per axis
        grid: (usize, usize),
    },

    /// Supplied block does not have the tile's computed shape
    #[error("incompatible block size: {actual:?} vs {expected:?}")]
    IncompatibleBlockShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Supplied dense matrix does not have the matrix shape
    #[error("incompatible matrix shape: {actual:?} vs {expected:?}")]
    IncompatibleShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Block object missing from the store
    #[error("block ({bx}, {by}) not found at '{key}'")]
    BlockNotFound { bx: usize, by: usize, key: String },

    /// Stored block holds a different element type
    #[error("dtype mismatch: expected {expected}, found {actual}")]
    DtypeMismatch { expected: DataType, actual: DataType },

    /// Stored block payload disagrees with the tile it is stored under
    #[error("corrupted block: {0}")]
    CorruptedBlock(String),

    /// Request shape not served by this matrix
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Destination region cannot hold the requested tiles
    #[error("region mismatch: {0}")]
    RegionMismatch(String),

    /// Block store failure
    #[error("storage error: {0}")]
    Io(#[from] StoreError),

    /// Pure format or addressing error
    #[error("format error: {0}")]
    Format(#[from] TileError),

    /// Header record could not be (de)serialized
    #[error("header serialization error: {0}")]
    Header(#[from] serde_json::Error),

    /// Memory-mapped region I/O failure
    #[error("region I/O error: {0}")]
    Region(#[from] std::io::Error),

    /// Worker pool could not be built
    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for matrix operations
pub type Result<T> = std::result::Result<T, MatrixError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tilestore_core::decode_block_key;

    fn parse_replica(key: &str) -> Result<usize> {
        Ok(decode_block_key(key)?.replica)
    }

    #[test]
    fn test_tile_error_converts_and_keeps_source() {
        let err = parse_replica("tilestore.objects/m/not-a-block").unwrap_err();
        assert!(matches!(err, MatrixError::Format(TileError::MalformedKey)));

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), TileError::MalformedKey.to_string());
        assert_eq!(
            parse_replica("tilestore.objects/m/0_4_4_0_4_4_2").unwrap(),
            2
        );
    }
}
