//! Operation Dispatch Layer
//!
//! This module validates operand extents and then selects the correct backend
//! (CPU or WGPU) for each engine operation, based on the global
//! [`Backend`](crate::backend::Backend).
//!
//! # Design Highlights
//! - **Checked first**: a mismatched extent is reported before any backend
//!   work, on every backend
//! - **Synchronous**: each function returns once its result is readable on
//!   the host; call order is effect order
//! - **Fallback logic**: a `Wgpu` selection in a build without the feature
//!   runs on the CPU

use super::{cpu, ElementwiseOp};
use crate::backend::{effective_backend, Backend};
use crate::error::{Error, Result};
use crate::matrix::{Extent, Matrix};
use crate::real::Real;
use tracing::trace;

fn expect_extent(op: &'static str, expected: Extent, found: Extent) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { op, expected, found })
    }
}

fn check_binary<T>(op: &'static str, a: &Matrix<T>, b: &Matrix<T>, out: &Matrix<T>) -> Result<()> {
    expect_extent(op, a.extent(), b.extent())?;
    expect_extent(op, a.extent(), out.extent())
}

fn check_unary<T>(op: &'static str, a: &Matrix<T>, out: &Matrix<T>) -> Result<()> {
    expect_extent(op, a.extent(), out.extent())
}

fn check_product<T>(op: &'static str, a: &Matrix<T>, b: &Matrix<T>, out: &Matrix<T>) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(Error::DimensionMismatch {
            op,
            expected: Extent::new(a.cols(), b.cols()),
            found: b.extent(),
        });
    }
    expect_extent(op, Extent::new(a.rows(), b.cols()), out.extent())
}

fn check_divisor<T: Real>(op: &'static str, divisor: T) -> Result<()> {
    if divisor == T::ZERO {
        Err(Error::DivisionByZero { op })
    } else {
        Ok(())
    }
}

/// Runs an elementwise kernel on the active backend.
///
/// `b` is only read by binary kernels; `k` only by scalar ones.
fn elementwise<T: Real>(
    op: ElementwiseOp,
    a: &Matrix<T>,
    b: Option<&Matrix<T>>,
    k: T,
    out: &mut Matrix<T>,
) -> Result<()> {
    debug_assert_eq!(op.is_binary(), b.is_some(), "{} operand count", op.name());
    let backend = effective_backend();
    trace!(op = op.name(), extent = %out.extent(), ?backend, "dispatch");
    if out.is_empty() {
        return Ok(());
    }

    if backend == Backend::Wgpu {
        #[cfg(feature = "wgpu")]
        {
            return super::wgpu::elementwise(op, a, b, k, out);
        }
    }

    match (op, b) {
        (ElementwiseOp::Add, Some(b)) => cpu::zip_with(a, b, out, |x, y| x + y),
        (ElementwiseOp::Sub, Some(b)) => cpu::zip_with(a, b, out, |x, y| x - y),
        (ElementwiseOp::Hadamard, Some(b)) => cpu::zip_with(a, b, out, |x, y| x * y),
        (ElementwiseOp::ScalarMult, _) => cpu::map(a, out, |x| x * k),
        (ElementwiseOp::ScalarDiv | ElementwiseOp::Normalize, _) => cpu::map(a, out, |x| x / k),
        (ElementwiseOp::Logistic, _) => cpu::map(a, out, |x| T::ONE / (T::ONE + (-x).exp())),
        (ElementwiseOp::Tanh, _) => cpu::map(a, out, |x| x.tanh()),
        (ElementwiseOp::Relu, _) => cpu::map(a, out, |x| if x < T::ZERO { T::ZERO } else { x }),
        (ElementwiseOp::ReluDerivative, _) => {
            cpu::map(a, out, |x| if x < T::ZERO { T::ZERO } else { T::ONE });
        }
        (ElementwiseOp::Exponent, _) => cpu::map(a, out, |x| (x + k).exp()),
        (ElementwiseOp::Transpose, _) => cpu::transpose(a, out),
        (ElementwiseOp::Add | ElementwiseOp::Sub | ElementwiseOp::Hadamard, None) => {
            unreachable!("binary kernel {} dispatched without a second operand", op.name())
        }
    }
    Ok(())
}

/// `out = a + b`.
pub fn add<T: Real>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    check_binary("add", a, b, out)?;
    elementwise(ElementwiseOp::Add, a, Some(b), T::ZERO, out)
}

/// `out = a - b`.
pub fn sub<T: Real>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    check_binary("sub", a, b, out)?;
    elementwise(ElementwiseOp::Sub, a, Some(b), T::ZERO, out)
}

/// `out = a ⊙ b`.
pub fn hadamard_product<T: Real>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    check_binary("hadamard_product", a, b, out)?;
    elementwise(ElementwiseOp::Hadamard, a, Some(b), T::ZERO, out)
}

/// `out = a * k`.
pub fn scalar_mult<T: Real>(a: &Matrix<T>, k: T, out: &mut Matrix<T>) -> Result<()> {
    check_unary("scalar_mult", a, out)?;
    elementwise(ElementwiseOp::ScalarMult, a, None, k, out)
}

/// `out = a / k`; `k == 0` is a domain error.
pub fn scalar_div<T: Real>(a: &Matrix<T>, k: T, out: &mut Matrix<T>) -> Result<()> {
    check_unary("scalar_div", a, out)?;
    check_divisor("scalar_div", k)?;
    elementwise(ElementwiseOp::ScalarDiv, a, None, k, out)
}

/// `out = aᵀ`.
pub fn transpose<T: Real>(a: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    expect_extent("transpose", a.extent().transposed(), out.extent())?;
    elementwise(ElementwiseOp::Transpose, a, None, T::ZERO, out)
}

/// Shared front half of both multiplies.
fn product<T: Real>(
    op: &'static str,
    tiled: bool,
    a: &Matrix<T>,
    b: &Matrix<T>,
    out: &mut Matrix<T>,
) -> Result<()> {
    check_product(op, a, b, out)?;
    let backend = effective_backend();
    trace!(op, lhs = %a.extent(), rhs = %b.extent(), ?backend, "dispatch");
    if out.is_empty() {
        return Ok(());
    }
    if a.cols() == 0 {
        out.fill(T::ZERO);
        return Ok(());
    }

    if backend == Backend::Wgpu {
        #[cfg(feature = "wgpu")]
        {
            return super::wgpu::matmul(op, tiled, a, b, out);
        }
    }

    if tiled {
        cpu::matmul_tiled(a, b, out);
    } else {
        cpu::matmul(a, b, out);
    }
    Ok(())
}

/// `out = a × b`, one worker per output element.
pub fn matrix_mult<T: Real>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    product("matrix_mult", false, a, b, out)
}

/// `out = a × b` through shared tiles with padded reads.
pub fn matrix_mult_tiled<T: Real>(a: &Matrix<T>, b: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    product("matrix_mult_tiled", true, a, b, out)
}

/// `out = 1 / (1 + e^-a)`.
pub fn logistic<T: Real>(a: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    check_unary("logistic", a, out)?;
    elementwise(ElementwiseOp::Logistic, a, None, T::ZERO, out)
}

/// `out = tanh(a)`.
pub fn tanh<T: Real>(a: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    check_unary("tanh", a, out)?;
    elementwise(ElementwiseOp::Tanh, a, None, T::ZERO, out)
}

/// `out = max(0, a)`.
pub fn relu<T: Real>(a: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    check_unary("relu", a, out)?;
    elementwise(ElementwiseOp::Relu, a, None, T::ZERO, out)
}

/// `out = 0 if a < 0 else 1`.
pub fn relu_derivative<T: Real>(a: &Matrix<T>, out: &mut Matrix<T>) -> Result<()> {
    check_unary("relu_derivative", a, out)?;
    elementwise(ElementwiseOp::ReluDerivative, a, None, T::ZERO, out)
}

/// `out = e^(a + shift)`.
pub fn exponent<T: Real>(a: &Matrix<T>, shift: T, out: &mut Matrix<T>) -> Result<()> {
    check_unary("exponent", a, out)?;
    elementwise(ElementwiseOp::Exponent, a, None, shift, out)
}

/// `out = a / sum`; `sum == 0` is a domain error.
pub fn softmax_normalize<T: Real>(a: &Matrix<T>, sum: T, out: &mut Matrix<T>) -> Result<()> {
    check_unary("softmax_normalize", a, out)?;
    check_divisor("softmax_normalize", sum)?;
    elementwise(ElementwiseOp::Normalize, a, None, sum, out)
}

/// `a /= sum` on the host, without a second buffer.
///
/// Same divisor rule as [`softmax_normalize`].
pub(crate) fn normalize_in_place<T: Real>(a: &mut Matrix<T>, sum: T) -> Result<()> {
    check_divisor("softmax_normalize", sum)?;
    trace!(op = "softmax_normalize", extent = %a.extent(), "in place");
    cpu::map_in_place(a, |v| v / sum);
    Ok(())
}

/// Sum of every element, reduced on the host.
pub fn sum<T: Real>(a: &Matrix<T>) -> T {
    trace!(op = "sum", extent = %a.extent(), "dispatch");
    cpu::sum(a)
}

/// Largest element, reduced on the host.
pub fn max<T: Real>(a: &Matrix<T>) -> Result<T> {
    trace!(op = "max", extent = %a.extent(), "dispatch");
    cpu::max(a).ok_or(Error::EmptyReduction { op: "max" })
}
