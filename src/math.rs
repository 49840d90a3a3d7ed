//! Matrix engine entry points.
//!
//! Every operation takes its operands by reference and a pre-sized result by
//! `&mut`, checks extents, runs on the active [`Backend`](crate::backend::Backend)
//! and overwrites every element of the result before returning.
//!
//! ```rust
//! use nnet::{math, matrix, matrix::Matrix};
//! let a: Matrix<f32> = matrix![[1.0, 2.0], [3.0, 4.0]];
//! let mut t = Matrix::new(2, 2);
//! math::transpose(&a, &mut t).unwrap();
//! assert_eq!(t.as_slice(), &[1.0, 3.0, 2.0, 4.0]);
//! ```

pub use crate::ops::dispatch::{
    add, exponent, hadamard_product, logistic, matrix_mult, matrix_mult_tiled, max, relu,
    relu_derivative, scalar_div, scalar_mult, softmax_normalize, sub, sum, tanh, transpose,
};
pub use crate::ops::TILE_SIZE;

use crate::error::Result;
use crate::ops::dispatch::normalize_in_place;
use crate::matrix::Matrix;
use crate::real::Real;

/// Softmax over the whole buffer: `e^(a - max) / Σ e^(a - max)`.
///
/// Shifting by the maximum keeps the exponentials finite; the result is the
/// same as the unshifted form. The exponentials are normalised in `out`
/// itself, so no second buffer is allocated.
///
/// # Errors
/// Whatever the composed operations report: a dimension mismatch, an empty
/// input ([`Error::EmptyReduction`](crate::error::Error::EmptyReduction)), or
/// a resource failure.
pub fn softmax<T: Real>(a: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    let peak = max(a)?;
    exponent(a, -peak, out)?;
    let total = sum(out);
    normalize_in_place(out, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::{matrices_within, within};

    #[test]
    fn softmax_sums_to_one_and_preserves_order() {
        let a: Matrix<f64> = crate::matrix![[-1.0, 0.0, 2.0]];
        let mut out = Matrix::new(1, 3);
        softmax(&a, &mut out).unwrap();
        assert!(within(sum(&out), 1.0, 1e-12));
        let s = out.as_slice();
        assert!(s[0] < s[1] && s[1] < s[2]);
    }

    #[test]
    fn softmax_survives_large_inputs() {
        let a: Matrix<f32> = crate::matrix![[1000.0, 1000.0]];
        let mut out = Matrix::new(1, 2);
        softmax(&a, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn softmax_matches_the_composed_steps() {
        let a: Matrix<f64> = crate::matrix![[0.5, -2.0], [3.0, 1.0]];
        let mut exps = Matrix::new(2, 2);
        exponent(&a, -3.0, &mut exps).unwrap();
        let mut expected = Matrix::new(2, 2);
        softmax_normalize(&exps, sum(&exps), &mut expected).unwrap();

        // stale contents must not leak into the result
        let mut out = Matrix::filled(2, 2, 42.0);
        softmax(&a, &mut out).unwrap();
        assert!(matrices_within(&out, &expected, 1e-12));
    }

    #[test]
    fn softmax_of_empty_input_is_an_error() {
        let a = Matrix::<f32>::new(0, 3);
        let mut out = Matrix::new(0, 3);
        assert!(softmax(&a, &mut out).unwrap_err().is_domain_error());
    }
}
