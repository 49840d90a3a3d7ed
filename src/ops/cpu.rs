//! Parallel CPU backend matrix operations
//!
//! # CPU Backend
//!
//! This module provides the rayon implementations of every engine kernel.
//! They are the default when calling `math::xyz`; dispatch lands here unless
//! the `wgpu` backend is both compiled in and selected.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - One task per output element group: elementwise kernels split the buffer,
//!   the naive multiply takes one output row per task, the tiled multiply one
//!   band of `TILE_SIZE` output rows per task
//! - Every call joins all of its tasks before returning
//!
//! ## Safety
//!
//! - No `unsafe`; operands are shared immutably, the result is split into
//!   disjoint mutable chunks
//! - Callers (the `dispatch` module) validate extents beforehand; these
//!   functions index under that assumption

use super::TILE_SIZE;
use crate::matrix::Matrix;
use crate::real::Real;
use rayon::prelude::*;

/// Applies `f` to every element of `a`, writing into `out`.
pub fn map<T, F>(a: &Matrix<T>, out: &mut Matrix<T>, f: F)
where
    T: Real,
    F: Fn(T) -> T + Sync + Send,
{
    out.as_mut_slice()
        .par_iter_mut()
        .zip(a.as_slice().par_iter())
        .for_each(|(y, &x)| *y = f(x));
}

/// Replaces every element of `a` with `f` of itself.
pub fn map_in_place<T, F>(a: &mut Matrix<T>, f: F)
where
    T: Real,
    F: Fn(T) -> T + Sync + Send,
{
    a.as_mut_slice().par_iter_mut().for_each(|x| *x = f(*x));
}

/// Combines `a` and `b` elementwise with `f`, writing into `out`.
pub fn zip_with<T, F>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>, f: F)
where
    T: Real,
    F: Fn(T, T) -> T + Sync + Send,
{
    out.as_mut_slice()
        .par_iter_mut()
        .zip(a.as_slice().par_iter().zip(b.as_slice().par_iter()))
        .for_each(|(y, (&l, &r))| *y = f(l, r));
}

/// `out[r][c] = a[c][r]`; `out` must be `a.cols x a.rows`.
pub fn transpose<T: Real>(a: &Matrix<T>, out: &mut Matrix<T>) {
    if out.is_empty() {
        return;
    }
    let a_cols = a.cols();
    let a_data = a.as_slice();
    let out_cols = out.cols();

    out.as_mut_slice()
        .par_chunks_mut(out_cols)
        .enumerate()
        .for_each(|(r, row)| {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = a_data[c * a_cols + r];
            }
        });
}

/// Performs a matrix multiplication `C = A × B` (`A: m×k`, `B: k×n`).
///
/// One rayon task per output row; each output element is an independent dot
/// product accumulated in ascending `k`.
pub fn matmul<T: Real>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>) {
    if out.is_empty() {
        return;
    }
    let k = a.cols();
    let n = b.cols();
    let a_data = a.as_slice();
    let b_data = b.as_slice();

    out.as_mut_slice()
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, cell) in row.iter_mut().enumerate() {
                let mut sum = T::ZERO;
                for l in 0..k {
                    sum += a_data[i * k + l] * b_data[l * n + j];
                }
                *cell = sum;
            }
        });
}

/// Where a [`TileWorkgroup`] stands between its two barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TilePhase {
    /// Shared storage may be overwritten with the next tile.
    Free,
    /// Every lane has staged its element; the tile may be consumed.
    Loaded,
}

/// Emulates one `TILE_SIZE x TILE_SIZE` workgroup of the tiled kernel.
///
/// Each `(lr, lc)` lane stages one element of A and one of B into shared
/// storage, then accumulates its output element over the tile width. The lanes
/// run in lock-step phases: `load` finishes for every lane before `consume`
/// starts (first barrier), and `consume` finishes for every lane before the
/// next `load` (second barrier). `phase` tracks this and is checked in debug
/// builds.
struct TileWorkgroup<T> {
    shared_a: [[T; TILE_SIZE]; TILE_SIZE],
    shared_b: [[T; TILE_SIZE]; TILE_SIZE],
    acc: [[T; TILE_SIZE]; TILE_SIZE],
    phase: TilePhase,
}

impl<T: Real> TileWorkgroup<T> {
    fn new() -> Self {
        Self {
            shared_a: [[T::ZERO; TILE_SIZE]; TILE_SIZE],
            shared_b: [[T::ZERO; TILE_SIZE]; TILE_SIZE],
            acc: [[T::ZERO; TILE_SIZE]; TILE_SIZE],
            phase: TilePhase::Free,
        }
    }

    /// Starts a new output tile.
    fn reset(&mut self) {
        self.acc = [[T::ZERO; TILE_SIZE]; TILE_SIZE];
        self.phase = TilePhase::Free;
    }

    /// Stages the A block at `(row0, k0)` and the B block at `(k0, col0)`.
    ///
    /// Coordinates past either source extent read as zero, so the last row,
    /// column and inner tiles contribute nothing beyond the real data.
    fn load(&mut self, a: &Matrix<T>, b: &Matrix<T>, row0: usize, col0: usize, k0: usize) {
        debug_assert_eq!(
            self.phase,
            TilePhase::Free,
            "shared tile overwritten before every lane consumed it"
        );
        for lr in 0..TILE_SIZE {
            for lc in 0..TILE_SIZE {
                self.shared_a[lr][lc] = a.padded_read(row0 + lr, k0 + lc);
                self.shared_b[lr][lc] = b.padded_read(k0 + lr, col0 + lc);
            }
        }
        // barrier: all loads complete
        self.phase = TilePhase::Loaded;
    }

    /// Accumulates one tile width of partial sums for every lane.
    fn consume(&mut self) {
        debug_assert_eq!(
            self.phase,
            TilePhase::Loaded,
            "shared tile consumed before every lane finished loading"
        );
        for lr in 0..TILE_SIZE {
            for lc in 0..TILE_SIZE {
                let mut sum = self.acc[lr][lc];
                for k in 0..TILE_SIZE {
                    sum += self.shared_a[lr][k] * self.shared_b[k][lc];
                }
                self.acc[lr][lc] = sum;
            }
        }
        // barrier: all lanes done reading the shared tile
        self.phase = TilePhase::Free;
    }

    /// Writes the accumulated tile into a band of output rows, dropping lanes
    /// that fall outside the result extent.
    fn store(&self, band: &mut [T], cols: usize, col0: usize) {
        let band_rows = band.len() / cols;
        for (lr, acc_row) in self.acc.iter().enumerate().take(band_rows) {
            for (lc, &value) in acc_row.iter().enumerate() {
                let col = col0 + lc;
                if col < cols {
                    band[lr * cols + col] = value;
                }
            }
        }
    }
}

/// Tiled matrix multiplication `C = A × B` with shared-tile staging.
///
/// The output is partitioned into `TILE_SIZE` square tiles; each band of
/// `TILE_SIZE` output rows is one rayon task that walks its tiles left to
/// right. For every tile the inner dimension is consumed one tile width at a
/// time through a [`TileWorkgroup`].
pub fn matmul_tiled<T: Real>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>) {
    if out.is_empty() {
        return;
    }
    let k = a.cols();
    let n = out.cols();
    let tile_cols = n.div_ceil(TILE_SIZE);

    out.as_mut_slice()
        .par_chunks_mut(TILE_SIZE * n)
        .enumerate()
        .for_each(|(tile_row, band)| {
            let row0 = tile_row * TILE_SIZE;
            let mut group = TileWorkgroup::new();
            for tile_col in 0..tile_cols {
                let col0 = tile_col * TILE_SIZE;
                group.reset();
                for k0 in (0..k).step_by(TILE_SIZE) {
                    group.load(a, b, row0, col0, k0);
                    group.consume();
                }
                group.store(band, n, col0);
            }
        });
}

/// Sum of every element.
pub fn sum<T: Real>(a: &Matrix<T>) -> T {
    a.as_slice()
        .par_iter()
        .copied()
        .reduce(|| T::ZERO, |x, y| x + y)
}

/// Largest element, or `None` when `a` is empty.
pub fn max<T: Real>(a: &Matrix<T>) -> Option<T> {
    a.as_slice().par_iter().copied().reduce_with(|x, y| x.max(y))
}
