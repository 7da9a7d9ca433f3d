//! Symmetric matrices storing only the lower block triangle
//!
//! Block `(i, j)` with `j > i` is never stored; it is served as the transpose
//! of the canonical block `(j, i)`. Canonical coordinates are `(max, min)`.

use hashbrown::HashSet;
use tilestore_core::{MatrixElement, MatrixHeader, TileSpan};
use tracing::warn;

use super::{Axis, BigMatrix, TiledMatrix};
use crate::config::MatrixConfig;
use crate::dense::Block;
use crate::error::{MatrixError, Result};
use crate::store::BlockStore;

/// Canonical storage coordinate of block `(i, j)`
pub fn canonical(i: usize, j: usize) -> (usize, usize) {
    (i.max(j), i.min(j))
}

/// Square matrix with square tiles, stored as its lower block triangle
#[derive(Debug)]
pub struct SymmetricMatrix<S> {
    inner: BigMatrix<S>,
}

impl<S: BlockStore> SymmetricMatrix<S> {
    /// Open an existing symmetric matrix or create a new one
    ///
    /// Shape and tile shape must both be square. Blocks are never
    /// replicated; a configured replication factor is ignored.
    pub fn open(store: S, config: MatrixConfig) -> Result<Self> {
        if config.replication_factor != 1 {
            warn!(
                key = %config.key,
                replication = config.replication_factor,
                "symmetric matrices store a single copy per block"
            );
        }
        let config = config.with_replication_factor(1);
        let inner = BigMatrix::open_with(store, config, |header: &MatrixHeader| {
            if header.is_square() {
                Ok(())
            } else {
                Err(MatrixError::InvalidSchema(format!(
                    "symmetric matrix needs square shape and tiles, got {:?} with tiles {:?}",
                    header.shape, header.tile_shape
                )))
            }
        })?;
        Ok(Self { inner })
    }

    /// Underlying general matrix addressing canonical blocks
    pub fn inner(&self) -> &BigMatrix<S> {
        &self.inner
    }

    pub fn upsert_header(&self) -> Result<()> {
        self.inner.upsert_header()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    pub fn tile_shape(&self) -> (usize, usize) {
        self.inner.tile_shape()
    }

    pub fn key(&self) -> &str {
        self.inner.key()
    }

    pub fn store(&self) -> &S {
        self.inner.store()
    }

    pub fn tile_grid(&self) -> (usize, usize) {
        self.inner.tile_grid()
    }

    pub fn blocks_axis(&self, axis: Axis) -> Vec<TileSpan> {
        self.inner.blocks_axis(axis)
    }

    pub fn block_idxs_axis(&self, axis: Axis) -> Vec<usize> {
        self.inner.block_idxs_axis(axis)
    }

    /// Canonical block indices `bx >= by`, row tile index major
    pub fn block_idxs(&self) -> Vec<(usize, usize)> {
        let n = self.tile_grid().0;
        (0..n)
            .flat_map(|bx| (0..=bx).map(move |by| (bx, by)))
            .collect()
    }

    pub fn blocks(&self) -> Vec<(TileSpan, TileSpan)> {
        self.inner.spans_of(&self.block_idxs())
    }

    fn stored_canonical(&self) -> Result<HashSet<(usize, usize)>> {
        Ok(self
            .inner
            .stored_block_idxs()?
            .into_iter()
            .map(|(bx, by)| canonical(bx, by))
            .collect())
    }

    pub fn existing_block_idxs(&self) -> Result<Vec<(usize, usize)>> {
        let stored = self.stored_canonical()?;
        Ok(self
            .block_idxs()
            .into_iter()
            .filter(|idx| stored.contains(idx))
            .collect())
    }

    pub fn missing_block_idxs(&self) -> Result<Vec<(usize, usize)>> {
        let stored = self.stored_canonical()?;
        Ok(self
            .block_idxs()
            .into_iter()
            .filter(|idx| !stored.contains(idx))
            .collect())
    }

    pub fn existing_blocks(&self) -> Result<Vec<(TileSpan, TileSpan)>> {
        Ok(self.inner.spans_of(&self.existing_block_idxs()?))
    }

    pub fn missing_blocks(&self) -> Result<Vec<(TileSpan, TileSpan)>> {
        Ok(self.inner.spans_of(&self.missing_block_idxs()?))
    }

    /// Block `(i, j)`, transposed from its canonical copy when `j > i`
    pub fn get_block<T: MatrixElement>(&self, i: usize, j: usize) -> Result<Block<T>> {
        if j > i {
            Ok(self.inner.get_block::<T>(j, i)?.transpose())
        } else {
            self.inner.get_block(i, j)
        }
    }

    /// Store `block` as block `(i, j)`
    ///
    /// For `j > i` the transpose is stored under `(j, i)`, so a later
    /// `get_block(j, i)` returns `block` transposed.
    pub fn put_block<T: MatrixElement>(&self, i: usize, j: usize, block: &Block<T>) -> Result<()> {
        if j > i {
            self.inner.put_block(j, i, &block.transpose())
        } else {
            self.inner.put_block(i, j, block)
        }
    }

    pub fn delete_block(&self, i: usize, j: usize) -> Result<()> {
        let (bx, by) = canonical(i, j);
        self.inner.delete_block(bx, by)
    }

    /// Delete every stored block, then the header
    pub fn free(&self) -> Result<()> {
        self.inner.free()
    }
}

impl<S: BlockStore> TiledMatrix for SymmetricMatrix<S> {
    fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    fn tile_shape(&self) -> (usize, usize) {
        self.inner.tile_shape()
    }

    fn config(&self) -> &MatrixConfig {
        self.inner.config()
    }

    fn block_idxs(&self) -> Vec<(usize, usize)> {
        Self::block_idxs(self)
    }

    fn get_block<T: MatrixElement>(&self, bx: usize, by: usize) -> Result<Block<T>> {
        Self::get_block(self, bx, by)
    }

    fn put_block<T: MatrixElement>(&self, bx: usize, by: usize, block: &Block<T>) -> Result<()> {
        Self::put_block(self, bx, by, block)
    }
}
