//! Tilestore - chunked, blob-store-backed storage for very large matrices
//!
//! A logical matrix is partitioned into fixed-size rectangular tiles and each
//! tile is stored as an independent object in a [`BlockStore`], under a key
//! derived from its coordinates and the configured tile size. Matrices can be
//! reopened from their persisted header, sharded in parallel from memory,
//! read back element by element, row by row or as whole regions, and freed.
//!
//! ## Architecture
//!
//! - **tilestore-core**: partition math, key codec, header record and block
//!   payload format (no I/O)
//! - **tilestore**: block stores, [`BigMatrix`], [`SymmetricMatrix`], region
//!   assembly and configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tilestore::{BigMatrix, DenseMatrix, FsStore, MatrixConfig, TiledMatrix};
//!
//! fn example() -> tilestore::Result<()> {
//!     let store = FsStore::open("/tmp/tilestore-bucket")?;
//!     let config = MatrixConfig::new("features")
//!         .with_shape(1000, 1000)
//!         .with_tile_shape(256, 256);
//!     let matrix = BigMatrix::open(store, config)?;
//!
//!     let full = DenseMatrix::from_fn(1000, 1000, |i, j| (i * j) as f64);
//!     matrix.shard_matrix(&full, None)?;
//!
//!     let value: f64 = matrix.element(999, 3)?;
//!     println!("matrix[999, 3] = {value}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **mmap** (default): assemble regions into memory-mapped files
//! - **cli**: dependencies of the `tile_cli` example

pub use tilestore_core::{
    // Addressing
    decode_block_key, encode_block_key, header_key, key_base, locate, tile_boundaries,
    tile_count, tile_span, BlockKey, Location, TileSpan,
    // Formats
    DataType, MatrixHeader,
    // Element types
    MatrixElement,
    // Pure errors
    TileError,
};

pub mod config;
pub mod dense;
pub mod error;
pub mod matrix;
pub mod region;
pub mod store;

pub use config::MatrixConfig;
pub use dense::{Block, DenseMatrix};
pub use error::{MatrixError, Result};
pub use matrix::{Access, Axis, BigMatrix, Selection, SymmetricMatrix, TiledMatrix};
pub use store::{BlockStore, FsStore, MemoryStore, StoreError, Visibility};

#[cfg(feature = "mmap")]
pub use region::RegionHandle;
