//! Assembly of tile groups into contiguous row-major regions
//!
//! Regions may be ordinary slices or, with the `mmap` feature, files mapped
//! into memory so that sub-matrices larger than RAM can be materialized.

use tilestore_core::validation::checked_element_count;
use tilestore_core::{tile_span, MatrixElement, TileError};
use tracing::debug;

use crate::dense::Block;
use crate::error::{MatrixError, Result};
use crate::matrix::TiledMatrix;

#[cfg(feature = "mmap")]
pub use self::mapped::RegionHandle;
#[cfg(feature = "mmap")]
pub(crate) use self::mapped::assemble_mmap;

pub(crate) fn assemble_into<M, T>(
    matrix: &M,
    block_rows: &[usize],
    block_cols: &[usize],
    dest: &mut [T],
    dest_shape: (usize, usize),
    row_offset: usize,
    col_offset: usize,
) -> Result<()>
where
    M: TiledMatrix + ?Sized,
    T: MatrixElement,
{
    let expected_len = checked_element_count(&[dest_shape.0, dest_shape.1])?;
    if dest.len() != expected_len {
        return Err(MatrixError::RegionMismatch(format!(
            "destination holds {} elements, shape {:?} needs {expected_len}",
            dest.len(),
            dest_shape
        )));
    }

    let (_, cols) = matrix.shape();
    let (tile_rows, tile_cols) = matrix.tile_shape();
    debug!(
        blocks = block_rows.len() * block_cols.len(),
        dest_shape = ?dest_shape,
        "assembling region"
    );

    let mut col_start = col_offset * tile_cols;
    for &by in block_cols {
        let width = tile_span(cols, tile_cols, by)
            .ok_or_else(|| MatrixError::BlockIndexOutOfRange {
                bx: block_rows.first().copied().unwrap_or(0),
                by,
                grid: matrix.tile_grid(),
            })?
            .len();

        for (i, &bx) in block_rows.iter().enumerate() {
            let block = matrix.get_block::<T>(bx, by)?;
            let row_start = (row_offset + i) * tile_rows;
            copy_block(&block, dest, dest_shape, row_start, col_start)?;
        }
        col_start += width;
    }
    Ok(())
}

fn copy_block<T: MatrixElement>(
    block: &Block<T>,
    dest: &mut [T],
    dest_shape: (usize, usize),
    row_start: usize,
    col_start: usize,
) -> Result<()> {
    let (rows, cols) = block.shape();
    if row_start + rows > dest_shape.0 || col_start + cols > dest_shape.1 {
        return Err(MatrixError::RegionMismatch(format!(
            "tile of shape {:?} at ({row_start}, {col_start}) exceeds region {:?}",
            block.shape(),
            dest_shape
        )));
    }

    for r in 0..rows {
        let start = (row_start + r) * dest_shape.1 + col_start;
        let src = block
            .row(r)
            .ok_or(MatrixError::Format(TileError::IndexOutOfBounds))?;
        dest[start..start + cols].copy_from_slice(src);
    }
    Ok(())
}

#[cfg(feature = "mmap")]
mod mapped {
    use std::fs::OpenOptions;
    use std::path::{Path, PathBuf};

    use memmap2::MmapMut;
    use tilestore_core::validation::{checked_byte_size, checked_element_count};
    use tilestore_core::{DataType, MatrixElement};
    use tracing::info;

    use crate::dense::DenseMatrix;
    use crate::error::{MatrixError, Result};
    use crate::matrix::TiledMatrix;

    /// Description of an assembled memory-mapped region
    ///
    /// The file holds `shape.0 * shape.1` elements of `dtype` in native byte
    /// order, row-major, with no header.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RegionHandle {
        pub path: PathBuf,
        pub shape: (usize, usize),
        pub dtype: DataType,
    }

    impl RegionHandle {
        /// Read the region file back into memory
        pub fn load<T: MatrixElement>(&self) -> Result<DenseMatrix<T>> {
            if self.dtype != T::data_type() {
                return Err(MatrixError::DtypeMismatch {
                    expected: T::data_type(),
                    actual: self.dtype,
                });
            }
            let count = checked_element_count(&[self.shape.0, self.shape.1])?;
            let byte_len = checked_byte_size(count, T::size_bytes())?;

            let bytes = std::fs::read(&self.path)?;
            if bytes.len() < byte_len {
                return Err(MatrixError::RegionMismatch(format!(
                    "region file holds {} bytes, shape {:?} needs {byte_len}",
                    bytes.len(),
                    self.shape
                )));
            }
            let data: Vec<T> = bytemuck::pod_collect_to_vec(&bytes[..byte_len]);
            DenseMatrix::new(self.shape.0, self.shape.1, data)
        }
    }

    pub(crate) fn assemble_mmap<M, T>(
        matrix: &M,
        path: &Path,
        block_rows: &[usize],
        block_cols: &[usize],
        dest_shape: (usize, usize),
        row_offset: usize,
        col_offset: usize,
    ) -> Result<RegionHandle>
    where
        M: TiledMatrix + ?Sized,
        T: MatrixElement,
    {
        let count = checked_element_count(&[dest_shape.0, dest_shape.1])?;
        let byte_len = checked_byte_size(count, T::size_bytes())?;
        let handle = RegionHandle {
            path: path.to_path_buf(),
            shape: dest_shape,
            dtype: T::data_type(),
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if file.metadata()?.len() < byte_len as u64 {
            file.set_len(byte_len as u64)?;
        }
        if byte_len == 0 {
            return Ok(handle);
        }

        // SAFETY: Memory-mapping is safe here because:
        // 1. The file was just opened read+write and sized to at least byte_len
        // 2. The File outlives the mapping, which is dropped before returning
        // 3. The MmapMut is owned exclusively by this call
        // 4. Concurrent external modification of the file is a caller error
        let mut mmap = unsafe { memmap2::MmapOptions::new().len(byte_len).map_mut(&file)? };
        fill_mapped::<M, T>(
            &mut mmap, matrix, block_rows, block_cols, dest_shape, row_offset, col_offset,
        )?;
        mmap.flush()?;

        info!(
            path = %path.display(),
            shape = ?dest_shape,
            dtype = %handle.dtype,
            "assembled memory-mapped region"
        );
        Ok(handle)
    }

    fn fill_mapped<M, T>(
        mmap: &mut MmapMut,
        matrix: &M,
        block_rows: &[usize],
        block_cols: &[usize],
        dest_shape: (usize, usize),
        row_offset: usize,
        col_offset: usize,
    ) -> Result<()>
    where
        M: TiledMatrix + ?Sized,
        T: MatrixElement,
    {
        // Page-aligned mappings satisfy every element alignment
        let dest: &mut [T] = bytemuck::try_cast_slice_mut(&mut mmap[..])
            .map_err(|e| MatrixError::RegionMismatch(format!("cannot view mapping as elements: {e}")))?;
        super::assemble_into(
            matrix,
            block_rows,
            block_cols,
            dest,
            dest_shape,
            row_offset,
            col_offset,
        )
    }
}
