#![no_std]

//! Tilestore Core - tile addressing and block format definitions
//!
//! This crate provides the pure pieces of tiled matrix storage: how an
//! extent is partitioned into tiles, how tiles are named in a flat key
//! space, and how headers and tile payloads are laid out. It performs no
//! I/O.

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod error;
pub mod format;
#[cfg(feature = "alloc")]
pub mod keys;
pub mod partition;
pub mod traits;
pub mod validation;

pub use error::*;
pub use format::*;
#[cfg(feature = "alloc")]
pub use keys::{decode_block_key, encode_block_key, header_key, key_base, BlockKey};
#[cfg(feature = "alloc")]
pub use partition::{block_grid, tile_boundaries};
pub use partition::{locate, tile_count, tile_span, tile_spans, Location, TileSpan, TileSpans};
pub use traits::*;
