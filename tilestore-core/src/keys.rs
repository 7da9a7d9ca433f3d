//! Deterministic storage keys for matrix headers and tiles
//!
//! Every object belonging to a matrix lives under
//! `"{prefix}{matrix_key}/"`. The header sits at `header` below that base and
//! each tile copy at
//! `"{start0}_{end0}_{tile0}_{start1}_{end1}_{tile1}_{replica}"`.
//!
//! Both the tile span and the configured tile size are embedded per axis, so
//! tiles written under a different tile-size configuration never decode to a
//! block of the current one.

use alloc::format;
use alloc::string::String;

use crate::partition::TileSpan;
use crate::validation::parsing::parse_fields;
use crate::{Result, TileError};

/// Final path component of the header object
pub const HEADER_COMPONENT: &str = "header";

/// Separator between block key fields
pub const FIELD_SEPARATOR: char = '_';

/// Coordinates of one stored tile copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// Row span of the tile
    pub rows: TileSpan,
    /// Configured tile height
    pub tile_rows: usize,
    /// Column span of the tile
    pub cols: TileSpan,
    /// Configured tile width
    pub tile_cols: usize,
    /// Replica index
    pub replica: usize,
}

impl BlockKey {
    /// Key fields for block `(bx, by)` of a matrix, or `None` if the index is
    /// past the grid
    pub fn for_block(
        shape: (usize, usize),
        tile_shape: (usize, usize),
        bx: usize,
        by: usize,
        replica: usize,
    ) -> Option<Self> {
        let rows = crate::partition::tile_span(shape.0, tile_shape.0, bx)?;
        let cols = crate::partition::tile_span(shape.1, tile_shape.1, by)?;
        Some(Self {
            rows,
            tile_rows: tile_shape.0,
            cols,
            tile_cols: tile_shape.1,
            replica,
        })
    }

    /// Encode the trailing key component
    pub fn component(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}_{}",
            self.rows.start,
            self.rows.end,
            self.tile_rows,
            self.cols.start,
            self.cols.end,
            self.tile_cols,
            self.replica
        )
    }

    /// Block index this key refers to, derived from span starts
    ///
    /// Returns `None` when the tile sizes are zero or the spans do not start
    /// on a tile boundary.
    pub fn block_index(&self) -> Option<(usize, usize)> {
        if self.tile_rows == 0 || self.tile_cols == 0 {
            return None;
        }
        if self.rows.start % self.tile_rows != 0 || self.cols.start % self.tile_cols != 0 {
            return None;
        }
        Some((self.rows.start / self.tile_rows, self.cols.start / self.tile_cols))
    }
}

/// Base path shared by every object of a matrix
pub fn key_base(prefix: &str, matrix_key: &str) -> String {
    format!("{prefix}{matrix_key}/")
}

/// Key of the matrix header
pub fn header_key(prefix: &str, matrix_key: &str) -> String {
    format!("{prefix}{matrix_key}/{HEADER_COMPONENT}")
}

/// Full storage key for one tile copy
pub fn encode_block_key(prefix: &str, matrix_key: &str, key: &BlockKey) -> String {
    format!("{prefix}{matrix_key}/{}", key.component())
}

/// Reverse a stored key into its tile coordinates
///
/// Only the final `/`-separated component is parsed, so the function works on
/// raw listing output regardless of prefix.
pub fn decode_block_key(key: &str) -> Result<BlockKey> {
    let component = key.rsplit('/').next().ok_or(TileError::MalformedKey)?;
    let [start0, end0, tile0, start1, end1, tile1, replica] =
        parse_fields::<7>(component, FIELD_SEPARATOR)?;

    if start0 > end0 || start1 > end1 {
        return Err(TileError::MalformedKey);
    }

    Ok(BlockKey {
        rows: TileSpan::new(start0, end0),
        tile_rows: tile0,
        cols: TileSpan::new(start1, end1),
        tile_cols: tile1,
        replica,
    })
}
