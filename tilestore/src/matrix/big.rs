//! General tiled matrix with optional block replication

use hashbrown::HashSet;
use rand::Rng;
use tilestore_core::{
    decode_block_key, encode_block_key, header_key, key_base, tile_count, tile_span, BlockKey,
    MatrixElement, MatrixHeader, TileSpan,
};
use tracing::{debug, info, trace, warn};

use super::{Axis, TiledMatrix};
use crate::config::MatrixConfig;
use crate::dense::Block;
use crate::error::{MatrixError, Result};
use crate::store::{BlockStore, StoreError, Visibility};

/// A matrix stored as tiles in a block store
///
/// Shape and tile shape are fixed once opened. Every query recomputes from
/// the store; nothing is cached between calls.
#[derive(Debug)]
pub struct BigMatrix<S> {
    store: S,
    config: MatrixConfig,
    header: MatrixHeader,
}

impl<S: BlockStore> BigMatrix<S> {
    /// Open an existing matrix or create a new one
    ///
    /// A stored header is authoritative. Without one, `config` must carry
    /// both shape and tile shape. The header is rewritten before returning.
    pub fn open(store: S, config: MatrixConfig) -> Result<Self> {
        Self::open_with(store, config, |_| Ok(()))
    }

    /// Open with an extra check on the resolved header before it is written
    pub(crate) fn open_with<F>(store: S, config: MatrixConfig, check: F) -> Result<Self>
    where
        F: FnOnce(&MatrixHeader) -> Result<()>,
    {
        config.validate()?;

        let header = match read_header(&store, &header_key(&config.prefix, &config.key))? {
            Some(stored) => {
                let shape_differs = config.shape.is_some_and(|s| s != stored.shape);
                let tiles_differ = config.tile_shape.is_some_and(|t| t != stored.tile_shape);
                if shape_differs || tiles_differ {
                    warn!(
                        key = %config.key,
                        stored_shape = ?stored.shape,
                        stored_tile_shape = ?stored.tile_shape,
                        requested_shape = ?config.shape,
                        requested_tile_shape = ?config.tile_shape,
                        "stored header overrides requested schema"
                    );
                }
                stored
            }
            None => match (config.shape, config.tile_shape) {
                (Some(shape), Some(tile_shape)) => MatrixHeader::new(shape, tile_shape),
                _ => {
                    return Err(MatrixError::MissingSchema {
                        key: config.key.clone(),
                    })
                }
            },
        };

        if !header.is_valid() {
            return Err(MatrixError::InvalidSchema(format!(
                "shape {:?} and tile shape {:?} must be positive",
                header.shape, header.tile_shape
            )));
        }
        check(&header)?;

        let matrix = Self {
            store,
            config,
            header,
        };
        matrix.upsert_header()?;

        info!(
            key = %matrix.config.key,
            shape = ?header.shape,
            tile_shape = ?header.tile_shape,
            replication = matrix.config.replication_factor,
            "opened matrix"
        );
        Ok(matrix)
    }

    /// Write the header record for the current shape and tile shape
    pub fn upsert_header(&self) -> Result<()> {
        let bytes = serde_json::to_vec(&self.header)?;
        self.store
            .put(&self.header_key(), &bytes, Visibility::default())?;
        Ok(())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.header.shape
    }

    pub fn tile_shape(&self) -> (usize, usize) {
        self.header.tile_shape
    }

    pub fn header(&self) -> MatrixHeader {
        self.header
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn replication_factor(&self) -> usize {
        self.config.replication_factor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn header_key(&self) -> String {
        header_key(&self.config.prefix, &self.config.key)
    }

    /// Key prefix shared by every object of this matrix
    pub fn key_base(&self) -> String {
        key_base(&self.config.prefix, &self.config.key)
    }

    /// Tile counts per axis
    pub fn tile_grid(&self) -> (usize, usize) {
        let (rows, cols) = self.shape();
        let (tile_rows, tile_cols) = self.tile_shape();
        (tile_count(rows, tile_rows), tile_count(cols, tile_cols))
    }

    /// Tile boundaries along one axis
    pub fn blocks_axis(&self, axis: Axis) -> Vec<TileSpan> {
        let (dim, tile) = match axis {
            Axis::Rows => (self.shape().0, self.tile_shape().0),
            Axis::Cols => (self.shape().1, self.tile_shape().1),
        };
        (0..tile_count(dim, tile))
            .filter_map(|idx| tile_span(dim, tile, idx))
            .collect()
    }

    /// Tile indices along one axis
    pub fn block_idxs_axis(&self, axis: Axis) -> Vec<usize> {
        let count = match axis {
            Axis::Rows => self.tile_grid().0,
            Axis::Cols => self.tile_grid().1,
        };
        (0..count).collect()
    }

    /// Every block index, row tile index major
    pub fn block_idxs(&self) -> Vec<(usize, usize)> {
        let (grid_rows, grid_cols) = self.tile_grid();
        (0..grid_rows)
            .flat_map(|bx| (0..grid_cols).map(move |by| (bx, by)))
            .collect()
    }

    /// Tile boundaries of every block, in block index order
    pub fn blocks(&self) -> Vec<(TileSpan, TileSpan)> {
        self.spans_of(&self.block_idxs())
    }

    /// Block indices with at least one stored replica, in universe order
    pub fn existing_block_idxs(&self) -> Result<Vec<(usize, usize)>> {
        let stored = self.stored_block_idxs()?;
        Ok(self
            .block_idxs()
            .into_iter()
            .filter(|idx| stored.contains(idx))
            .collect())
    }

    /// Block indices with no stored replica, in universe order
    pub fn missing_block_idxs(&self) -> Result<Vec<(usize, usize)>> {
        let stored = self.stored_block_idxs()?;
        Ok(self
            .block_idxs()
            .into_iter()
            .filter(|idx| !stored.contains(idx))
            .collect())
    }

    pub fn existing_blocks(&self) -> Result<Vec<(TileSpan, TileSpan)>> {
        Ok(self.spans_of(&self.existing_block_idxs()?))
    }

    pub fn missing_blocks(&self) -> Result<Vec<(TileSpan, TileSpan)>> {
        Ok(self.spans_of(&self.missing_block_idxs()?))
    }

    /// Block indices decoded from every stored key under this matrix
    ///
    /// Keys written under another tile configuration, foreign objects and
    /// the header are skipped.
    pub(crate) fn stored_block_idxs(&self) -> Result<HashSet<(usize, usize)>> {
        Ok(self
            .stored_block_keys()?
            .into_iter()
            .map(|(_, idx)| idx)
            .collect())
    }

    /// Every stored block key under this matrix with the block it decodes to
    ///
    /// Covers every replica index present in the store, whatever the
    /// configured replication factor.
    fn stored_block_keys(&self) -> Result<Vec<(String, (usize, usize))>> {
        let base = self.key_base();
        let keys = self.store.list(&base)?;

        let mut stored = Vec::new();
        for key in keys {
            let decoded = match decode_block_key(&key) {
                Ok(decoded) => decoded,
                Err(e) => {
                    trace!(key = %key, error = %e, "ignoring non-block key");
                    continue;
                }
            };
            match self.block_index_of(&decoded) {
                Some(idx) => stored.push((key, idx)),
                None => trace!(key = %key, "ignoring key from another tile layout"),
            }
        }
        Ok(stored)
    }

    fn block_index_of(&self, key: &BlockKey) -> Option<(usize, usize)> {
        if (key.tile_rows, key.tile_cols) != self.tile_shape() {
            return None;
        }
        let (bx, by) = key.block_index()?;
        let expected = BlockKey::for_block(self.shape(), self.tile_shape(), bx, by, key.replica)?;
        (expected == *key).then_some((bx, by))
    }

    pub(crate) fn spans_of(&self, idxs: &[(usize, usize)]) -> Vec<(TileSpan, TileSpan)> {
        let (rows, cols) = self.shape();
        let (tile_rows, tile_cols) = self.tile_shape();
        idxs.iter()
            .filter_map(|&(bx, by)| {
                Some((
                    tile_span(rows, tile_rows, bx)?,
                    tile_span(cols, tile_cols, by)?,
                ))
            })
            .collect()
    }

    fn block_key(&self, bx: usize, by: usize, replica: usize) -> Result<String> {
        let key = BlockKey::for_block(self.shape(), self.tile_shape(), bx, by, replica).ok_or(
            MatrixError::BlockIndexOutOfRange {
                bx,
                by,
                grid: self.tile_grid(),
            },
        )?;
        Ok(encode_block_key(&self.config.prefix, &self.config.key, &key))
    }

    /// Shape the tile `(bx, by)` must have
    pub fn expected_block_shape(&self, bx: usize, by: usize) -> Result<(usize, usize)> {
        let (rows, cols) = self.shape();
        let (tile_rows, tile_cols) = self.tile_shape();
        match (tile_span(rows, tile_rows, bx), tile_span(cols, tile_cols, by)) {
            (Some(r), Some(c)) => Ok((r.len(), c.len())),
            _ => Err(MatrixError::BlockIndexOutOfRange {
                bx,
                by,
                grid: self.tile_grid(),
            }),
        }
    }

    /// Fetch block `(bx, by)` from a randomly chosen replica
    ///
    /// Transient store failures are retried up to `read_attempts` times. With
    /// `replica_fallback` the remaining replicas are tried in turn when the
    /// chosen one cannot be read.
    pub fn get_block<T: MatrixElement>(&self, bx: usize, by: usize) -> Result<Block<T>> {
        let expected = self.expected_block_shape(bx, by)?;
        let replicas = self.config.replication_factor;
        let first = rand::thread_rng().gen_range(0..replicas);
        let tried = if self.config.replica_fallback { replicas } else { 1 };

        let mut last_err = None;
        for replica in (0..tried).map(|step| (first + step) % replicas) {
            match self.read_replica(bx, by, replica) {
                Ok(bytes) => return self.decode_block(bx, by, expected, &bytes),
                Err(e) => {
                    if tried > 1 {
                        warn!(bx, by, replica, error = %e, "replica unreadable");
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(MatrixError::BlockIndexOutOfRange {
            bx,
            by,
            grid: self.tile_grid(),
        }))
    }

    /// Block `(bx, by)` of the transposed matrix
    ///
    /// Reads stored block `(by, bx)` and transposes it.
    pub fn get_block_transposed<T: MatrixElement>(&self, bx: usize, by: usize) -> Result<Block<T>> {
        Ok(self.get_block::<T>(by, bx)?.transpose())
    }

    fn read_replica(&self, bx: usize, by: usize, replica: usize) -> Result<Vec<u8>> {
        let key = self.block_key(bx, by, replica)?;
        let attempts = self.config.read_attempts;

        let mut attempt = 1;
        loop {
            match self.store.get(&key) {
                Ok(bytes) => {
                    debug!(key = %key, bytes = bytes.len(), "read block");
                    return Ok(bytes);
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(MatrixError::BlockNotFound { bx, by, key });
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(key = %key, attempt, attempts, error = %e, "retrying block read");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn decode_block<T: MatrixElement>(
        &self,
        bx: usize,
        by: usize,
        expected: (usize, usize),
        bytes: &[u8],
    ) -> Result<Block<T>> {
        let block = Block::<T>::from_payload(bytes)?;
        if block.shape() != expected {
            return Err(MatrixError::CorruptedBlock(format!(
                "block ({bx}, {by}) stored with shape {:?}, tile is {expected:?}",
                block.shape()
            )));
        }
        Ok(block)
    }

    /// Store `block` at `(bx, by)` in every replica
    ///
    /// The shape is checked before anything is written. Writes are not
    /// retried and a failure can leave some replicas updated.
    pub fn put_block<T: MatrixElement>(&self, bx: usize, by: usize, block: &Block<T>) -> Result<()> {
        let expected = self.expected_block_shape(bx, by)?;
        if block.shape() != expected {
            return Err(MatrixError::IncompatibleBlockShape {
                expected,
                actual: block.shape(),
            });
        }

        let payload = block.to_payload()?;
        for replica in 0..self.config.replication_factor {
            let key = self.block_key(bx, by, replica)?;
            self.store.put(&key, &payload, Visibility::default())?;
            debug!(key = %key, bytes = payload.len(), "wrote block");
        }
        Ok(())
    }

    /// Delete every stored replica of block `(bx, by)`
    ///
    /// Replicas are found by listing, so copies written under a larger
    /// replication factor are removed too.
    pub fn delete_block(&self, bx: usize, by: usize) -> Result<()> {
        self.expected_block_shape(bx, by)?;
        let keys = self.stored_block_keys()?;
        let mut deleted = 0;
        for (key, _) in keys.iter().filter(|(_, idx)| *idx == (bx, by)) {
            self.store.delete(key)?;
            deleted += 1;
            debug!(key = %key, "deleted block");
        }
        trace!(bx, by, replicas = deleted, "block deleted");
        Ok(())
    }

    /// Delete every stored block, then the header
    ///
    /// Not atomic: a failure part way leaves the remaining blocks in place
    /// and the header intact.
    pub fn free(&self) -> Result<()> {
        let keys = self.stored_block_keys()?;
        let blocks: HashSet<(usize, usize)> = keys.iter().map(|(_, idx)| *idx).collect();
        for (key, _) in &keys {
            self.store.delete(key)?;
            debug!(key = %key, "deleted block");
        }
        self.store.delete(&self.header_key())?;
        info!(
            key = %self.config.key,
            blocks = blocks.len(),
            objects = keys.len(),
            "freed matrix"
        );
        Ok(())
    }
}

fn read_header<S: BlockStore>(store: &S, key: &str) -> Result<Option<MatrixHeader>> {
    match store.get(key) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl<S: BlockStore> TiledMatrix for BigMatrix<S> {
    fn shape(&self) -> (usize, usize) {
        self.header.shape
    }

    fn tile_shape(&self) -> (usize, usize) {
        self.header.tile_shape
    }

    fn config(&self) -> &MatrixConfig {
        &self.config
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::DenseMatrix;
    use crate::matrix::{Access, Selection};
    use crate::store::flaky::FlakyStore;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn config(shape: (usize, usize), tile: (usize, usize)) -> MatrixConfig {
        MatrixConfig::new("test-matrix")
            .with_shape(shape.0, shape.1)
            .with_tile_shape(tile.0, tile.1)
            .with_shard_parallelism(4)
    }

    fn ramp(rows: usize, cols: usize) -> DenseMatrix<f64> {
        DenseMatrix::from_fn(rows, cols, |i, j| (i * cols + j) as f64 + 0.5)
    }

    #[test]
    fn test_open_requires_schema() {
        let store = MemoryStore::new();
        let err = BigMatrix::open(&store, MatrixConfig::new("empty")).unwrap_err();
        assert!(matches!(err, MatrixError::MissingSchema { .. }));

        let only_shape = MatrixConfig::new("empty").with_shape(4, 4);
        assert!(matches!(
            BigMatrix::open(&store, only_shape).unwrap_err(),
            MatrixError::MissingSchema { .. }
        ));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_open_rejects_zero_schema() {
        let store = MemoryStore::new();
        let err = BigMatrix::open(&store, config((0, 4), (2, 2))).unwrap_err();
        assert!(matches!(err, MatrixError::InvalidSchema(_)));
        let err = BigMatrix::open(&store, config((4, 4), (2, 0))).unwrap_err();
        assert!(matches!(err, MatrixError::InvalidSchema(_)));
    }

    #[test]
    fn test_header_written_and_recovered() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((10, 6), (4, 3))).unwrap();
        let raw = store.get(&matrix.header_key()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["shape"], serde_json::json!([10, 6]));
        assert_eq!(json["shard_sizes"], serde_json::json!([4, 3]));

        let reopened = BigMatrix::open(&store, MatrixConfig::new("test-matrix")).unwrap();
        assert_eq!(reopened.shape(), (10, 6));
        assert_eq!(reopened.tile_shape(), (4, 3));

        // Stored header wins over a conflicting request
        let conflicting = BigMatrix::open(&store, config((99, 99), (7, 7))).unwrap();
        assert_eq!(conflicting.shape(), (10, 6));
        assert_eq!(conflicting.tile_shape(), (4, 3));
        let raw = store.get(&conflicting.header_key()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["shape"], serde_json::json!([10, 6]));
        assert_eq!(json["shard_sizes"], serde_json::json!([4, 3]));
    }

    #[test]
    fn test_block_universe_scenario() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((10, 10), (4, 4))).unwrap();
        assert_eq!(
            matrix.blocks_axis(Axis::Rows),
            vec![TileSpan::new(0, 4), TileSpan::new(4, 8), TileSpan::new(8, 10)]
        );
        assert_eq!(matrix.block_idxs_axis(Axis::Cols), vec![0, 1, 2]);
        assert_eq!(matrix.block_idxs().len(), 9);
        assert_eq!(matrix.block_idxs()[..4], [(0, 0), (0, 1), (0, 2), (1, 0)]);
        assert_eq!(
            matrix.blocks()[8],
            (TileSpan::new(8, 10), TileSpan::new(8, 10))
        );
        assert_eq!(matrix.missing_block_idxs().unwrap().len(), 9);
        assert!(matrix.existing_blocks().unwrap().is_empty());
    }

    #[test]
    fn test_put_get_block() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((10, 10), (4, 4))).unwrap();
        let block = DenseMatrix::from_fn(2, 4, |i, j| (i * 4 + j) as i64);
        matrix.put_block(2, 1, &block).unwrap();

        assert_eq!(matrix.get_block::<i64>(2, 1).unwrap(), block);
        assert_eq!(matrix.existing_block_idxs().unwrap(), vec![(2, 1)]);
        assert_eq!(
            matrix.existing_blocks().unwrap(),
            vec![(TileSpan::new(8, 10), TileSpan::new(4, 8))]
        );
        assert!(store
            .exists("tilestore.objects/test-matrix/8_10_4_4_8_4_0")
            .unwrap());

        let transposed = matrix.get_block_transposed::<i64>(1, 2).unwrap();
        assert_eq!(transposed, block.transpose());
    }

    #[test]
    fn test_put_block_validates_before_writing() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((10, 10), (4, 4))).unwrap();
        let objects_before = store.len().unwrap();

        let err = matrix
            .put_block(2, 2, &DenseMatrix::<f64>::zeros(4, 4))
            .unwrap_err();
        assert!(matches!(
            err,
            MatrixError::IncompatibleBlockShape {
                expected: (2, 2),
                actual: (4, 4)
            }
        ));

        let err = matrix
            .put_block(3, 0, &DenseMatrix::<f64>::zeros(4, 4))
            .unwrap_err();
        assert!(matches!(err, MatrixError::BlockIndexOutOfRange { bx: 3, by: 0, .. }));
        assert_eq!(store.len().unwrap(), objects_before);
    }

    #[test]
    fn test_get_missing_block() {
        let store = FlakyStore::new();
        let matrix = BigMatrix::open(&store, config((8, 8), (4, 4))).unwrap();
        let gets_before = store.get_count();
        let err = matrix.get_block::<f64>(1, 1).unwrap_err();
        assert!(matches!(err, MatrixError::BlockNotFound { bx: 1, by: 1, .. }));
        // Not-found is not retried
        assert_eq!(store.get_count() - gets_before, 1);
    }

    #[test]
    fn test_get_block_checks_dtype_and_shape() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((8, 8), (4, 4))).unwrap();
        matrix.put_block(0, 0, &DenseMatrix::<f32>::zeros(4, 4)).unwrap();
        assert!(matches!(
            matrix.get_block::<f64>(0, 0).unwrap_err(),
            MatrixError::DtypeMismatch { .. }
        ));

        let wrong = DenseMatrix::<f32>::zeros(3, 4).to_payload().unwrap();
        store
            .put(&matrix.block_key(1, 0, 0).unwrap(), &wrong, Visibility::default())
            .unwrap();
        assert!(matches!(
            matrix.get_block::<f32>(1, 0).unwrap_err(),
            MatrixError::CorruptedBlock(_)
        ));
    }

    #[test]
    fn test_read_retries_transient_failures() {
        let store = FlakyStore::new();
        let matrix = BigMatrix::open(&store, config((4, 4), (4, 4))).unwrap();
        let block = ramp(4, 4);
        matrix.put_block(0, 0, &block).unwrap();

        store.fail_gets(4);
        assert_eq!(matrix.get_block::<f64>(0, 0).unwrap(), block);

        store.fail_gets(5);
        let err = matrix.get_block::<f64>(0, 0).unwrap_err();
        assert!(matches!(err, MatrixError::Io(StoreError::Backend(_))));
    }

    #[test]
    fn test_replica_fallback_tries_other_replicas() {
        let store = FlakyStore::new();
        let matrix = BigMatrix::open(
            &store,
            config((4, 4), (4, 4))
                .with_replication_factor(2)
                .with_read_attempts(1)
                .with_replica_fallback(true),
        )
        .unwrap();
        let block = ramp(4, 4);
        matrix.put_block(0, 0, &block).unwrap();

        store.fail_gets(1);
        assert_eq!(matrix.get_block::<f64>(0, 0).unwrap(), block);
    }

    #[test]
    fn test_writes_are_not_retried() {
        let store = FlakyStore::new();
        let matrix = BigMatrix::open(&store, config((4, 4), (2, 2))).unwrap();
        let puts_before = store.put_count();

        store.fail_puts(1);
        let err = matrix.put_block(0, 0, &ramp(2, 2)).unwrap_err();
        assert!(matches!(err, MatrixError::Io(_)));
        assert_eq!(store.put_count() - puts_before, 1);
        assert!(matrix.existing_block_idxs().unwrap().is_empty());
    }

    #[test]
    fn test_replicated_reads_are_consistent() {
        let store = MemoryStore::new();
        let matrix =
            BigMatrix::open(&store, config((6, 6), (3, 3)).with_replication_factor(3)).unwrap();
        let block = ramp(3, 3);
        matrix.put_block(1, 0, &block).unwrap();

        let replicas = store
            .list(&matrix.key_base())
            .unwrap()
            .into_iter()
            .filter(|k| k.ends_with(|c: char| c.is_ascii_digit()))
            .count();
        assert_eq!(replicas, 3);
        assert_eq!(matrix.existing_block_idxs().unwrap(), vec![(1, 0)]);

        for _ in 0..50 {
            assert_eq!(matrix.get_block::<f64>(1, 0).unwrap(), block);
        }

        matrix.delete_block(1, 0).unwrap();
        assert!(matrix.existing_block_idxs().unwrap().is_empty());
    }

    #[test]
    fn test_existence_ignores_foreign_keys() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((10, 10), (4, 4))).unwrap();
        let base = matrix.key_base();
        for component in [
            "not-a-block",
            "0_4_2_0_4_4_0",   // other tile size
            "0_3_4_0_4_4_0",   // span disagrees with the grid
            "12_16_4_0_4_4_0", // past the grid
            "0_4_4_0_4_4_7",   // stray replica still marks the block
        ] {
            store
                .put(&format!("{base}{component}"), b"", Visibility::default())
                .unwrap();
        }
        // Shares the key as a prefix but belongs to another matrix
        store
            .put(
                "tilestore.objects/test-matrix2/4_8_4_0_4_4_0",
                b"",
                Visibility::default(),
            )
            .unwrap();

        assert_eq!(matrix.existing_block_idxs().unwrap(), vec![(0, 0)]);
    }

    #[test]
    fn test_shard_and_free() {
        let store = Arc::new(MemoryStore::new());
        let matrix = BigMatrix::open(Arc::clone(&store), config((11, 7), (4, 3))).unwrap();
        let full = ramp(11, 7);

        matrix.shard_matrix(&full, None).unwrap();
        assert!(matrix.missing_block_idxs().unwrap().is_empty());
        assert_eq!(matrix.existing_block_idxs().unwrap(), matrix.block_idxs());
        assert_eq!(matrix.to_dense::<f64>().unwrap(), full);

        matrix.free().unwrap();
        assert!(matrix.existing_block_idxs().unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_free_after_reopen_with_lower_replication() {
        let store = MemoryStore::new();
        let full = ramp(4, 4);
        let wide =
            BigMatrix::open(&store, config((4, 4), (2, 2)).with_replication_factor(3)).unwrap();
        wide.shard_matrix(&full, None).unwrap();
        assert_eq!(store.len().unwrap(), 4 * 3 + 1);

        let narrow = BigMatrix::open(&store, MatrixConfig::new("test-matrix")).unwrap();
        assert_eq!(narrow.replication_factor(), 1);
        assert_eq!(narrow.existing_block_idxs().unwrap().len(), 4);

        narrow.free().unwrap();
        assert!(narrow.existing_block_idxs().unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_delete_block_removes_stray_replicas() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((8, 8), (4, 4))).unwrap();
        let block = ramp(4, 4);
        matrix.put_block(1, 1, &block).unwrap();
        matrix.put_block(0, 1, &block).unwrap();
        let stray = format!("{}4_8_4_4_8_4_5", matrix.key_base());
        store
            .put(&stray, &block.to_payload().unwrap(), Visibility::default())
            .unwrap();

        matrix.delete_block(1, 1).unwrap();
        assert!(!store.exists(&stray).unwrap());
        assert_eq!(matrix.existing_block_idxs().unwrap(), vec![(0, 1)]);

        assert!(matches!(
            matrix.delete_block(2, 0).unwrap_err(),
            MatrixError::BlockIndexOutOfRange { bx: 2, by: 0, .. }
        ));
    }

    #[test]
    fn test_shard_on_caller_pool() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((9, 9), (2, 5))).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let full = DenseMatrix::from_fn(9, 9, |i, j| ((i as u32) << 8) | j as u32);

        matrix.shard_matrix(&full, Some(&pool)).unwrap();
        assert_eq!(matrix.to_dense::<u32>().unwrap(), full);

        let err = matrix
            .shard_matrix(&DenseMatrix::<u32>::zeros(9, 8), Some(&pool))
            .unwrap_err();
        assert!(matches!(err, MatrixError::IncompatibleShape { .. }));
    }

    #[test]
    fn test_shard_surfaces_write_failure() {
        let store = FlakyStore::new();
        let matrix = BigMatrix::open(&store, config((8, 8), (2, 2))).unwrap();
        store.fail_puts(1);
        let err = matrix.shard_matrix(&ramp(8, 8), None).unwrap_err();
        assert!(matches!(err, MatrixError::Io(_)));
    }

    #[test]
    fn test_element_and_row_access() {
        let store = MemoryStore::new();
        let matrix = BigMatrix::open(&store, config((10, 10), (4, 4))).unwrap();
        let full = ramp(10, 10);
        matrix.shard_matrix(&full, None).unwrap();

        assert_eq!(matrix.element::<f64>(9, 9).unwrap(), full.get(9, 9).unwrap());
        assert_eq!(matrix.element::<f64>(3, 4).unwrap(), full.get(3, 4).unwrap());
        assert_eq!(matrix.row::<f64>(5).unwrap(), full.row(5).unwrap());

        assert_eq!(
            matrix.get::<f64>(Access::Element(0, 7)).unwrap(),
            Selection::Scalar(full.get(0, 7).unwrap())
        );
        assert_eq!(
            matrix
                .get::<f64>(Access::RowSlice { row: 8, cols: 0..10 })
                .unwrap()
                .into_row()
                .unwrap(),
            full.row(8).unwrap()
        );
        assert!(matches!(
            matrix.get::<f64>(Access::RowSlice { row: 8, cols: 2..5 }),
            Err(MatrixError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            matrix.get::<f64>(Access::Column(1)),
            Err(MatrixError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            matrix.element::<f64>(10, 0),
            Err(MatrixError::OutOfBounds { axis: 0, index: 10, extent: 10 })
        ));
        assert!(matches!(
            matrix.row::<f64>(11),
            Err(MatrixError::OutOfBounds { axis: 0, .. })
        ));
    }
}
