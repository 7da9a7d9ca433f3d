//! Dense row-major 2-D arrays used as tile contents

use tilestore_core::{
    decode_elements, decode_payload, encode_elements, MatrixElement, TileError, TileSpan,
};

use crate::error::{MatrixError, Result};

/// Dense row-major matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

/// A single tile's contents
pub type Block<T> = DenseMatrix<T>;

impl<T: MatrixElement> DenseMatrix<T> {
    /// Wrap a row-major buffer of `rows * cols` elements
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or(TileError::ArraySizeOverflow)?;
        if data.len() != expected {
            return Err(MatrixError::Format(TileError::CorruptedData));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    /// Build a matrix by evaluating `f(i, j)` for every element
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.cols + j])
        } else {
            None
        }
    }

    pub fn row(&self, i: usize) -> Option<&[T]> {
        if i < self.rows {
            Some(&self.data[i * self.cols..(i + 1) * self.cols])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn transpose(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |i, j| self.data[j * self.cols + i])
    }

    /// Copy out the sub-matrix covered by the two spans
    ///
    /// Returns `None` when either span reaches past the matrix.
    pub fn slice(&self, rows: TileSpan, cols: TileSpan) -> Option<Self> {
        if rows.end > self.rows || cols.end > self.cols {
            return None;
        }
        let mut data = Vec::with_capacity(rows.len() * cols.len());
        for i in rows.start..rows.end {
            let base = i * self.cols;
            data.extend_from_slice(&self.data[base + cols.start..base + cols.end]);
        }
        Some(Self {
            rows: rows.len(),
            cols: cols.len(),
            data,
        })
    }

    /// Concatenate blocks of equal height along the column axis
    pub fn hstack(blocks: &[Self]) -> Result<Self> {
        let rows = blocks.first().map_or(0, |b| b.rows);
        if let Some(bad) = blocks.iter().find(|b| b.rows != rows) {
            return Err(MatrixError::IncompatibleBlockShape {
                expected: (rows, bad.cols),
                actual: bad.shape(),
            });
        }
        let cols: usize = blocks.iter().map(|b| b.cols).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for block in blocks {
                data.extend_from_slice(&block.data[i * block.cols..(i + 1) * block.cols]);
            }
        }
        Ok(Self { rows, cols, data })
    }

    /// Encode into the self-describing block payload format
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(encode_elements(&[self.rows, self.cols], &self.data)?)
    }

    /// Decode a block payload holding a 2-D array of `T`
    pub fn from_payload(bytes: &[u8]) -> Result<Self> {
        let view = decode_payload(bytes)?;
        if view.data_type() != T::data_type() {
            return Err(MatrixError::DtypeMismatch {
                expected: T::data_type(),
                actual: view.data_type(),
            });
        }
        let [rows, cols] = view.dims[..] else {
            return Err(MatrixError::CorruptedBlock(format!(
                "expected a 2-d payload, found {} dimensions",
                view.dims.len()
            )));
        };
        let data = decode_elements(&view)?;
        Ok(Self { rows, cols, data })
    }
}
