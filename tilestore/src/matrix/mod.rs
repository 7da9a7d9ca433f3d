//! Tiled matrices over a block store
//!
//! [`TiledMatrix`] holds the behaviour shared by both matrix kinds. An
//! implementor supplies its block universe and block-level get/put; element
//! access, sharding and region assembly are written once on top of those.

use std::ops::Range;

use rayon::prelude::*;
use tilestore_core::{locate, tile_count, tile_span, MatrixElement};
use tracing::info;

use crate::config::MatrixConfig;
use crate::dense::{Block, DenseMatrix};
use crate::error::{MatrixError, Result};
use crate::region;

pub mod big;
pub mod symmetric;

pub use big::BigMatrix;
pub use symmetric::SymmetricMatrix;

/// Matrix axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Cols,
}

/// Element access request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// A single element `(i, j)`
    Element(usize, usize),
    /// A whole row
    Row(usize),
    /// A whole column (not served)
    Column(usize),
    /// A column range of one row; only the full range is served
    RowSlice { row: usize, cols: Range<usize> },
}

/// Result of an [`Access`] request
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<T> {
    Scalar(T),
    Row(Vec<T>),
}

impl<T> Selection<T> {
    pub fn into_scalar(self) -> Option<T> {
        match self {
            Selection::Scalar(v) => Some(v),
            Selection::Row(_) => None,
        }
    }

    pub fn into_row(self) -> Option<Vec<T>> {
        match self {
            Selection::Row(v) => Some(v),
            Selection::Scalar(_) => None,
        }
    }
}

/// A matrix stored as independently addressable tiles
pub trait TiledMatrix {
    /// Logical shape (rows, cols)
    fn shape(&self) -> (usize, usize);

    /// Tile shape (tile height, tile width)
    fn tile_shape(&self) -> (usize, usize);

    fn config(&self) -> &MatrixConfig;

    /// Every block index this matrix can store, in universe order
    fn block_idxs(&self) -> Vec<(usize, usize)>;

    /// Fetch and decode block `(bx, by)`
    fn get_block<T: MatrixElement>(&self, bx: usize, by: usize) -> Result<Block<T>>;

    /// Store block `(bx, by)`, replacing any previous contents
    fn put_block<T: MatrixElement>(&self, bx: usize, by: usize, block: &Block<T>) -> Result<()>;

    /// Tile counts per axis
    fn tile_grid(&self) -> (usize, usize) {
        let (rows, cols) = self.shape();
        let (tile_rows, tile_cols) = self.tile_shape();
        (tile_count(rows, tile_rows), tile_count(cols, tile_cols))
    }

    fn element<T: MatrixElement>(&self, i: usize, j: usize) -> Result<T> {
        let (rows, cols) = self.shape();
        check_index(0, i, rows)?;
        check_index(1, j, cols)?;

        let loc = locate(self.shape(), self.tile_shape(), i, j)?;
        let block = self.get_block::<T>(loc.bx, loc.by)?;
        block.get(loc.offset_x, loc.offset_y).ok_or_else(|| {
            MatrixError::CorruptedBlock(format!(
                "block ({}, {}) has shape {:?}, offset ({}, {}) is outside it",
                loc.bx,
                loc.by,
                block.shape(),
                loc.offset_x,
                loc.offset_y
            ))
        })
    }

    /// Row `i`, gathered from every tile of its tile-row
    fn row<T: MatrixElement>(&self, i: usize) -> Result<Vec<T>> {
        let (rows, cols) = self.shape();
        check_index(0, i, rows)?;

        let loc = locate(self.shape(), self.tile_shape(), i, 0)?;
        let mut out = Vec::with_capacity(cols);
        for by in 0..self.tile_grid().1 {
            let block = self.get_block::<T>(loc.bx, by)?;
            let row = block.row(loc.offset_x).ok_or_else(|| {
                MatrixError::CorruptedBlock(format!(
                    "block ({}, {by}) has {} rows, row offset {} is outside it",
                    loc.bx,
                    block.rows(),
                    loc.offset_x
                ))
            })?;
            out.extend_from_slice(row);
        }
        Ok(out)
    }

    /// Serve an element or row request
    fn get<T: MatrixElement>(&self, access: Access) -> Result<Selection<T>> {
        match access {
            Access::Element(i, j) => self.element(i, j).map(Selection::Scalar),
            Access::Row(i) => self.row(i).map(Selection::Row),
            Access::RowSlice { row, cols } if cols.start == 0 && cols.end == self.shape().1 => {
                self.row(row).map(Selection::Row)
            }
            Access::RowSlice { .. } => Err(MatrixError::UnsupportedOperation(
                "partial row slices are not supported",
            )),
            Access::Column(_) => Err(MatrixError::UnsupportedOperation(
                "column access is not supported",
            )),
        }
    }

    /// Split `full` along the tile grid and write every tile in parallel
    ///
    /// Runs on `pool` when given, otherwise on a pool of
    /// `shard_parallelism` threads built for this call. Returns once every
    /// write has settled; the first failure is returned and tiles already
    /// written stay written.
    fn shard_matrix<T: MatrixElement>(
        &self,
        full: &DenseMatrix<T>,
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<()>
    where
        Self: Sync,
    {
        if full.shape() != self.shape() {
            return Err(MatrixError::IncompatibleShape {
                expected: self.shape(),
                actual: full.shape(),
            });
        }

        let idxs = self.block_idxs();
        info!(
            key = %self.config().key,
            shape = ?self.shape(),
            blocks = idxs.len(),
            "sharding matrix"
        );

        let write_all = || {
            idxs.par_iter()
                .try_for_each(|&(bx, by)| self.put_block(bx, by, &self.tile_of(full, bx, by)?))
        };

        match pool {
            Some(pool) => pool.install(write_all),
            None => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config().shard_parallelism)
                    .build()
                    .map_err(|e| MatrixError::WorkerPool(e.to_string()))?;
                pool.install(write_all)
            }
        }
    }

    /// Cut the tile `(bx, by)` out of a full-shape dense matrix
    fn tile_of<T: MatrixElement>(
        &self,
        full: &DenseMatrix<T>,
        bx: usize,
        by: usize,
    ) -> Result<Block<T>> {
        let (rows, cols) = self.shape();
        let (tile_rows, tile_cols) = self.tile_shape();
        let out_of_range = || MatrixError::BlockIndexOutOfRange {
            bx,
            by,
            grid: self.tile_grid(),
        };
        let row_span = tile_span(rows, tile_rows, bx).ok_or_else(out_of_range)?;
        let col_span = tile_span(cols, tile_cols, by).ok_or_else(out_of_range)?;
        full.slice(row_span, col_span).ok_or_else(out_of_range)
    }

    /// Copy the tiles `block_rows x block_cols` into a row-major destination
    ///
    /// Tiles are placed column-group by column-group. Column placement starts
    /// at `col_offset * tile_width` and advances by each tile's width; the
    /// `i`-th entry of `block_rows` lands at row `(row_offset + i) *
    /// tile_height`.
    fn assemble_region<T: MatrixElement>(
        &self,
        block_rows: &[usize],
        block_cols: &[usize],
        dest: &mut [T],
        dest_shape: (usize, usize),
        row_offset: usize,
        col_offset: usize,
    ) -> Result<()> {
        region::assemble_into(
            self,
            block_rows,
            block_cols,
            dest,
            dest_shape,
            row_offset,
            col_offset,
        )
    }

    /// Assemble tiles into a memory-mapped file of `dest_shape` elements
    ///
    /// The file is created or extended as needed and flushed once at the end.
    #[cfg(feature = "mmap")]
    fn assemble_region_mmap<T: MatrixElement, P: AsRef<std::path::Path>>(
        &self,
        path: P,
        block_rows: &[usize],
        block_cols: &[usize],
        dest_shape: (usize, usize),
        row_offset: usize,
        col_offset: usize,
    ) -> Result<region::RegionHandle> {
        region::assemble_mmap::<Self, T>(
            self,
            path.as_ref(),
            block_rows,
            block_cols,
            dest_shape,
            row_offset,
            col_offset,
        )
    }

    /// Assemble the whole matrix in memory
    fn to_dense<T: MatrixElement>(&self) -> Result<DenseMatrix<T>> {
        let (rows, cols) = self.shape();
        let (grid_rows, grid_cols) = self.tile_grid();
        let mut data = Vec::with_capacity(rows * cols);
        for bx in 0..grid_rows {
            let tiles = (0..grid_cols)
                .map(|by| self.get_block::<T>(bx, by))
                .collect::<Result<Vec<_>>>()?;
            data.extend(DenseMatrix::hstack(&tiles)?.into_vec());
        }
        DenseMatrix::new(rows, cols, data)
    }
}

fn check_index(axis: usize, index: usize, extent: usize) -> Result<()> {
    if index >= extent {
        return Err(MatrixError::OutOfBounds {
            axis,
            index,
            extent,
        });
    }
    Ok(())
}
