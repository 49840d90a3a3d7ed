//! Utilities to approximate equality of floating point values.
//!
//! Kernels are free to accumulate in any order, so results are compared with
//! a tolerance rather than bit for bit.

use crate::matrix::Matrix;
use crate::real::Real;

/// The max epsilon accepted on `f32`s.
pub const F32_MAX_ERROR: f32 = 1e-3;

/// The expected minimum epsilon accepted on `f32`s.
pub const F32_AVG_ERROR: f32 = 1e-5;

/// The best expected epsilon accepted on `f32`s.
pub const F32_MIN_ERROR: f32 = 1e-6;

/// Default relative tolerance for comparing kernel outputs.
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-5;

/// The approximated equality enumerated.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

/// Checks the relative distance based off epsilon.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Enumerates the equality of `self`
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

/// Grades a scalar difference, scaled by the larger magnitude once that exceeds one.
fn grade<T: Real>(a: T, b: T) -> ApproxEquality {
    let (a, b) = (a.into_f64(), b.into_f64());
    if a == b {
        return ApproxEquality::Precise;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    let dif = (a - b).abs() / scale;

    if dif < f64::from(F32_MIN_ERROR) {
        ApproxEquality::Precise
    } else if dif < f64::from(F32_AVG_ERROR) {
        ApproxEquality::Partial
    } else if dif < f64::from(F32_MAX_ERROR) {
        ApproxEquality::Relative
    } else {
        ApproxEquality::Scarce
    }
}

impl RelativeEq<Self> for f32 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        grade(*self, *rhs)
    }
}

impl RelativeEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        grade(*self, *rhs)
    }
}

impl<T: Real + RelativeEq<T>> RelativeEq<[T]> for [T] {
    fn approx_eq(&self, rhs: &[T]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        let mut eq = ApproxEquality::Precise;
        for (t_val, u_val) in self.iter().zip(rhs) {
            let eq_rating = t_val.approx_eq(u_val);
            if eq_rating == ApproxEquality::Scarce {
                return eq_rating; // can't improve from here; not equal
            }
            eq = eq.max(eq_rating);
        }
        eq
    }
}

impl<T: Real + RelativeEq<T>> RelativeEq<Self> for Matrix<T> {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.extent() != rhs.extent() {
            return ApproxEquality::Scarce;
        }
        self.as_slice().approx_eq(rhs.as_slice())
    }
}

/// Approximates equality based off the relative difference.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) <= ApproxEquality::Partial
}

/// `|a - b| <= tolerance * max(1, |a|, |b|)`.
pub fn within<T: Real>(a: T, b: T, tolerance: f64) -> bool {
    let (a, b) = (a.into_f64(), b.into_f64());
    a == b || (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}

/// Elementwise [`within`] over two matrices of the same extent.
pub fn matrices_within<T: Real>(a: &Matrix<T>, b: &Matrix<T>, tolerance: f64) -> bool {
    a.extent() == b.extent()
        && a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .all(|(&x, &y)| within(x, y, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_by_distance() {
        assert_eq!(1.0f32.approx_eq(&1.0), ApproxEquality::Precise);
        assert_eq!(1.0f32.approx_eq(&1.000_002), ApproxEquality::Partial);
        assert_eq!(1.0f32.approx_eq(&1.0005), ApproxEquality::Relative);
        assert_eq!(1.0f32.approx_eq(&1.1), ApproxEquality::Scarce);
    }

    #[test]
    fn large_values_scale_the_tolerance() {
        assert!(within(1.0e6f64, 1.0e6 + 1.0, 1e-5));
        assert!(!within(1.0f64, 1.0 + 1e-3, 1e-5));
    }

    #[test]
    fn matrices_with_different_extents_are_unequal() {
        let a = Matrix::<f32>::new(2, 3);
        let b = Matrix::<f32>::new(3, 2);
        assert_eq!(a.approx_eq(&b), ApproxEquality::Scarce);
        assert!(!matrices_within(&a, &b, 1.0));
    }
}
