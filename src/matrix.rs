//! Rank-2 numeric buffers.
//!
//! # Core Matrix Utilities
//!
//! A [`Matrix`] is a row-major, two-dimensional buffer whose [`Extent`] is
//! fixed when it is created. Contents are mutable; the shape never is.
//!
//! ## Design Highlights
//! - Matrices are strongly typed: `Matrix<T>` for any [`Real`] element type
//! - Extents are checked once, at construction, and by every engine operation
//! - Out-of-extent accesses go through [`Matrix::padded_read`] and
//!   [`Matrix::padded_write`], which substitute zero or drop the write
//! - The [`matrix!`](crate::matrix!) macro builds matrices from nested literals
//!
//! ## Ownership
//! Engine operations take their result as `&mut Matrix<T>` and their operands
//! as `&Matrix<T>`, so a buffer can never be written by two live computations
//! at once, while any number of readers may share it.
//!
//! ## Example
//!
//! ```rust
//! use nnet::matrix::Matrix;
//! let m = Matrix::from_vec(2, 3, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! assert_eq!(m.get(1, 2), Some(6.0));
//! assert_eq!(m.padded_read(2, 0), 0.0);
//! ```

use crate::error::{Error, Result};
use crate::real::Real;
use core::fmt;

/// Row and column count of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Extent {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl Extent {
    /// Creates an extent of `rows x cols`.
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of elements covered.
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the extent covers no element.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `(row, col)` lies inside the extent.
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// The extent with rows and columns swapped.
    pub const fn transposed(&self) -> Self {
        Self::new(self.cols, self.rows)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl From<(usize, usize)> for Extent {
    fn from((rows, cols): (usize, usize)) -> Self {
        Self::new(rows, cols)
    }
}

/// A dense, row-major, two-dimensional buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    extent: Extent,
    data: Vec<T>,
}

impl<T: Real> Matrix<T> {
    /// Creates a zero-filled matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, T::ZERO)
    }

    /// Creates a matrix with every element set to `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        let extent = Extent::new(rows, cols);
        Self {
            extent,
            data: vec![value; extent.len()],
        }
    }

    /// Creates a zero-filled matrix of the given extent.
    pub fn zeros(extent: Extent) -> Self {
        Self::new(extent.rows, extent.cols)
    }

    /// Wraps flat row-major data.
    ///
    /// # Errors
    /// [`Error::BufferLength`] if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        let extent = Extent::new(rows, cols);
        if data.len() != extent.len() {
            return Err(Error::BufferLength {
                expected: extent.len(),
                found: data.len(),
            });
        }
        Ok(Self { extent, data })
    }

    /// Builds a matrix from row slices.
    ///
    /// # Errors
    /// [`Error::BufferLength`] if the rows are ragged.
    pub fn from_rows(rows: &[&[T]]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(Error::BufferLength {
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), cols, data)
    }

    /// Reads the element at `(row, col)`, or zero when outside the extent.
    #[inline]
    pub fn padded_read(&self, row: usize, col: usize) -> T {
        if self.extent.contains(row, col) {
            self.data[row * self.extent.cols + col]
        } else {
            T::ZERO
        }
    }

    /// Writes `value` at `(row, col)` when inside the extent; otherwise drops it.
    #[inline]
    pub fn padded_write(&mut self, row: usize, col: usize, value: T) {
        if self.extent.contains(row, col) {
            self.data[row * self.extent.cols + col] = value;
        }
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Matrix<T> {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.extent.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.extent.cols
    }

    /// The fixed extent of this buffer.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the matrix holds no element.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major view of the elements.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major view; the extent cannot change through it.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the matrix, returning its row-major data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// One row as a slice.
    ///
    /// # Panics
    /// Panics if `row` is out of bounds.
    pub fn row(&self, row: usize) -> &[T] {
        assert!(row < self.extent.rows, "row {row} out of bounds for {}", self.extent);
        let start = row * self.extent.cols;
        &self.data[start..start + self.extent.cols]
    }
}

impl<T: Copy> Matrix<T> {
    /// The element at `(row, col)`, if inside the extent.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.extent
            .contains(row, col)
            .then(|| self.data[row * self.extent.cols + col])
    }

    /// Overwrites the element at `(row, col)`.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if the coordinate is outside the extent.
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if !self.extent.contains(row, col) {
            return Err(Error::DimensionMismatch {
                op: "set",
                expected: self.extent,
                found: Extent::new(row + 1, col + 1),
            });
        }
        self.data[row * self.extent.cols + col] = value;
        Ok(())
    }
}

/// Defines a matrix from nested literal rows.
///
/// # Panics
/// Panics if the rows are ragged.
///
/// # Example
/// ```
/// use nnet::matrix;
/// let m: nnet::matrix::Matrix<f32> = matrix![[1.0, 2.0], [3.0, 4.0]];
/// assert_eq!(m.extent(), nnet::matrix::Extent::new(2, 2));
/// ```
#[macro_export]
macro_rules! matrix {
    ($([$($x:expr),* $(,)?]),+ $(,)?) => {
        $crate::matrix::Matrix::from_rows(&[$(&[$($x),*][..]),+])
            .expect("matrix! rows must all have the same length")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Matrix::<f32>::from_vec(2, 2, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, Error::BufferLength { expected: 4, found: 3 });
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let rows: [&[f64]; 2] = [&[1.0, 2.0], &[3.0]];
        assert!(Matrix::from_rows(&rows).is_err());
    }

    #[test]
    fn padded_access_outside_extent() {
        let mut m: Matrix<f32> = crate::matrix![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(m.padded_read(1, 1), 4.0);
        assert_eq!(m.padded_read(2, 0), 0.0);
        assert_eq!(m.padded_read(0, 7), 0.0);

        m.padded_write(5, 5, 9.0);
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        m.padded_write(0, 1, 9.0);
        assert_eq!(m.get(0, 1), Some(9.0));
    }

    #[test]
    fn set_outside_extent_is_an_error() {
        let mut m = Matrix::<f32>::new(1, 1);
        assert!(m.set(0, 0, 2.0).is_ok());
        assert!(m.set(1, 0, 2.0).is_err());
    }

    #[test]
    fn extent_helpers() {
        let e = Extent::new(3, 5);
        assert_eq!(e.len(), 15);
        assert_eq!(e.transposed(), Extent::new(5, 3));
        assert!(e.contains(2, 4));
        assert!(!e.contains(3, 0));
        assert_eq!(e.to_string(), "3x5");
    }
}
