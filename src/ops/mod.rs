//! # Operation Dispatch Layer
//!
//! This module defines and dispatches matrix operations across the compute
//! backends.
//!
//! ## Submodules
//!
//! - [`cpu`] — rayon kernels (default backend)
//! - `wgpu` *(opt-in)* — WGSL compute pipelines using `wgpu`
//! - [`dispatch`] — extent checks, backend switching and unified entry points
//!
//! ## Extending the Backend
//!
//! To add a new operation:
//!
//! 1. Implement it in one or more backends (e.g. `cpu::my_op`, `wgpu::my_op`)
//! 2. Add it to the `dispatch` module, with its extent checks, for unified access
//! 3. Re-export it from [`crate::math`]
//!
//! ## Notes
//!
//! - Every operation is synchronous: it returns once the result buffer is
//!   coherent on the host
//! - Extent checks run before any backend is touched
//!
//! ## Feature Flags
//!
//! - `wgpu` — Enables the `wgpu` (WebGPU) backend

// dispatch layer...
pub mod dispatch;

// ... across these backends:
pub mod cpu;

#[cfg(feature = "wgpu")]
pub mod wgpu;

/// Edge of the square tiles used by the tiled multiply on every backend.
pub const TILE_SIZE: usize = 8;

/// Elementwise kernels, shared by the backends so they agree on numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ElementwiseOp {
    /// `a + b`
    Add = 0,
    /// `a - b`
    Sub = 1,
    /// `a * b`
    Hadamard = 2,
    /// `a * k`
    ScalarMult = 3,
    /// `a / k`
    ScalarDiv = 4,
    /// `1 / (1 + e^-a)`
    Logistic = 5,
    /// `tanh(a)`
    Tanh = 6,
    /// `max(0, a)`
    Relu = 7,
    /// `0 if a < 0 else 1`
    ReluDerivative = 8,
    /// `e^(a + k)`
    Exponent = 9,
    /// `a / k` with a caller-computed sum
    Normalize = 10,
    /// `out[r][c] = a[c][r]`
    Transpose = 11,
}

impl ElementwiseOp {
    /// Name used in errors and traces.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Hadamard => "hadamard_product",
            Self::ScalarMult => "scalar_mult",
            Self::ScalarDiv => "scalar_div",
            Self::Logistic => "logistic",
            Self::Tanh => "tanh",
            Self::Relu => "relu",
            Self::ReluDerivative => "relu_derivative",
            Self::Exponent => "exponent",
            Self::Normalize => "softmax_normalize",
            Self::Transpose => "transpose",
        }
    }

    /// Whether the kernel reads a second operand.
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Hadamard)
    }
}
