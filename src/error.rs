//! Error taxonomy shared by the matrix engine and the layers.
//!
//! Three families of failure exist:
//!
//! - **Shape** errors ([`Error::DimensionMismatch`], [`Error::BufferLength`],
//!   [`Error::InvalidLayerShape`]) are precondition violations. They are
//!   detected before any backend work is dispatched.
//! - **Numeric-domain** errors ([`Error::DivisionByZero`],
//!   [`Error::EmptyReduction`]) are reported instead of letting an infinity or
//!   NaN leak into downstream layers.
//! - **Resource** errors ([`Error::Resource`]) come from the accelerator:
//!   adapter or device acquisition, allocation, validation or mapping failures.
//!
//! Nothing in the crate retries; every error propagates to the caller.

use crate::matrix::Extent;
use thiserror::Error;

/// Alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong inside the engine or a layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Operand extents violate the operation's precondition.
    #[error("{op}: dimension mismatch, expected {expected}, found {found}")]
    DimensionMismatch {
        /// Operation that rejected its operands.
        op: &'static str,
        /// Extent the operation required.
        expected: Extent,
        /// Extent it was given.
        found: Extent,
    },

    /// A flat buffer does not hold `rows * cols` elements.
    #[error("buffer holds {found} elements, extent requires {expected}")]
    BufferLength {
        /// Elements required by the extent.
        expected: usize,
        /// Elements supplied.
        found: usize,
    },

    /// Division by zero in a scaling step.
    #[error("{op}: division by zero")]
    DivisionByZero {
        /// Operation that would have divided by zero.
        op: &'static str,
    },

    /// A reduction without an identity was asked for on an empty buffer.
    #[error("{op}: reduction over an empty buffer")]
    EmptyReduction {
        /// Reduction that was attempted.
        op: &'static str,
    },

    /// A layer cannot be built with a zero-sized dimension.
    #[error(
        "invalid layer shape: input {input_size}, output {output_size}, batch {batch_size}"
    )]
    InvalidLayerShape {
        /// Requested input width.
        input_size: usize,
        /// Requested output width.
        output_size: usize,
        /// Requested batch size.
        batch_size: usize,
    },

    /// The accelerator failed to allocate, launch or read back.
    #[error("{op}: accelerator failure on a {extent} result: {reason}")]
    Resource {
        /// Operation that was running.
        op: &'static str,
        /// Extent of the result buffer involved.
        extent: Extent,
        /// Backend-provided description.
        reason: String,
    },
}

impl Error {
    /// Returns `true` for the shape family of errors.
    pub fn is_dimension_error(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::BufferLength { .. } | Self::InvalidLayerShape { .. }
        )
    }

    /// Returns `true` for numeric-domain errors.
    pub fn is_domain_error(&self) -> bool {
        matches!(self, Self::DivisionByZero { .. } | Self::EmptyReduction { .. })
    }

    /// Returns `true` for accelerator failures.
    pub fn is_resource_error(&self) -> bool {
        matches!(self, Self::Resource { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation_and_extents() {
        let err = Error::DimensionMismatch {
            op: "add",
            expected: Extent::new(2, 3),
            found: Extent::new(3, 2),
        };
        assert_eq!(err.to_string(), "add: dimension mismatch, expected 2x3, found 3x2");
        assert!(err.is_dimension_error());
        assert!(!err.is_resource_error());
    }

    #[test]
    fn families_are_disjoint() {
        let div = Error::DivisionByZero { op: "scalar_div" };
        assert!(div.is_domain_error());
        assert!(!div.is_dimension_error());

        let res = Error::Resource {
            op: "matrix_mult",
            extent: Extent::new(4, 4),
            reason: "out of memory".into(),
        };
        assert!(res.is_resource_error());
        assert!(!res.is_domain_error());
    }
}
