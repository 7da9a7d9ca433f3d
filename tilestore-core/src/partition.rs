//! Tile partitioning of a 2-D matrix extent
//!
//! Pure functions mapping an axis length and a tile size to the ordered,
//! non-overlapping tile spans that cover it, and a matrix shape plus tile
//! shape to the grid of block indices. Nothing here allocates except the
//! collecting helpers behind the `alloc` feature.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::{Result, TileError};

/// Half-open interval `[start, end)` along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileSpan {
    pub start: usize,
    pub end: usize,
}

impl TileSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of elements covered by the span
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub const fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

impl From<(usize, usize)> for TileSpan {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

/// Position of an element inside the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Tile row index
    pub bx: usize,
    /// Tile column index
    pub by: usize,
    /// Row offset within the tile
    pub offset_x: usize,
    /// Column offset within the tile
    pub offset_y: usize,
}

/// Iterator over the tile spans of one axis
#[derive(Debug, Clone)]
pub struct TileSpans {
    next_start: usize,
    dimension: usize,
    tile_size: usize,
}

impl Iterator for TileSpans {
    type Item = TileSpan;

    fn next(&mut self) -> Option<TileSpan> {
        if self.next_start >= self.dimension {
            return None;
        }
        let start = self.next_start;
        let end = start.saturating_add(self.tile_size).min(self.dimension);
        self.next_start = end;
        Some(TileSpan { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = tile_count(self.dimension - self.next_start.min(self.dimension), self.tile_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileSpans {}

/// Iterate the spans tiling `[0, dimension)` with tiles of `tile_size`
///
/// Every span has length `tile_size` except possibly the last, which is
/// clipped to end exactly at `dimension`. An empty axis yields nothing.
pub fn tile_spans(dimension: usize, tile_size: usize) -> Result<TileSpans> {
    if tile_size == 0 {
        return Err(TileError::InvalidTileSize);
    }
    Ok(TileSpans {
        next_start: 0,
        dimension,
        tile_size,
    })
}

/// Number of tiles along an axis
pub const fn tile_count(dimension: usize, tile_size: usize) -> usize {
    if tile_size == 0 {
        return 0;
    }
    dimension.div_ceil(tile_size)
}

/// Span of tile `index` along an axis, or `None` past the last tile
pub const fn tile_span(dimension: usize, tile_size: usize, index: usize) -> Option<TileSpan> {
    if index >= tile_count(dimension, tile_size) {
        return None;
    }
    let start = index * tile_size;
    let end = if start + tile_size < dimension {
        start + tile_size
    } else {
        dimension
    };
    Some(TileSpan { start, end })
}

/// Ordered tile boundaries covering `[0, dimension)` exactly once
#[cfg(feature = "alloc")]
pub fn tile_boundaries(dimension: usize, tile_size: usize) -> Result<Vec<TileSpan>> {
    Ok(tile_spans(dimension, tile_size)?.collect())
}

/// All block indices of the grid, row tile index major
#[cfg(feature = "alloc")]
pub fn block_grid(shape: (usize, usize), tile_shape: (usize, usize)) -> Result<Vec<(usize, usize)>> {
    if tile_shape.0 == 0 || tile_shape.1 == 0 {
        return Err(TileError::InvalidTileSize);
    }
    let rows = tile_count(shape.0, tile_shape.0);
    let cols = tile_count(shape.1, tile_shape.1);
    let mut grid = Vec::with_capacity(rows * cols);
    for bx in 0..rows {
        for by in 0..cols {
            grid.push((bx, by));
        }
    }
    Ok(grid)
}

/// Find the tile holding element `(i, j)` and the offset inside it
///
/// Scans each axis's spans in order; an index outside `[0, shape[axis])`
/// yields [`TileError::IndexOutOfBounds`].
pub fn locate(
    shape: (usize, usize),
    tile_shape: (usize, usize),
    i: usize,
    j: usize,
) -> Result<Location> {
    let (bx, offset_x) = locate_on_axis(shape.0, tile_shape.0, i)?;
    let (by, offset_y) = locate_on_axis(shape.1, tile_shape.1, j)?;
    Ok(Location {
        bx,
        by,
        offset_x,
        offset_y,
    })
}

fn locate_on_axis(dimension: usize, tile_size: usize, index: usize) -> Result<(usize, usize)> {
    tile_spans(dimension, tile_size)?
        .enumerate()
        .find(|(_, span)| span.contains(index))
        .map(|(block, span)| (block, index - span.start))
        .ok_or(TileError::IndexOutOfBounds)
}
