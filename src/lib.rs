//! # `nnet`
//!
//! A data-parallel dense matrix engine and the neuron layers built on it.
//!
//! Every engine operation is synchronous and overwrites a caller-provided
//! result buffer. Work runs on a rayon pool by default, or as WGSL compute
//! shaders through `wgpu` when the `wgpu` feature is enabled and selected.
//!
//! ## Features
//!
//! - **Matrices**: fixed-extent, row-major buffers with padded access
//! - **Engine**: elementwise arithmetic, activations, transpose, naive and
//!   tiled multiplication, softmax steps and reductions
//! - **Layers**: dense layers generic over their activation (rectified
//!   linear, logistic, tanh) with seeded weight initialisation and a reusable
//!   buffer pool
//! - **GPU Acceleration**: optional `wgpu` compute pipelines
//!
//! ## Modules
//!
//! - [`matrix`] — [`Matrix`](matrix::Matrix) and [`Extent`](matrix::Extent)
//! - [`math`] — engine entry points
//! - [`layers`] — [`Neuron`](layers::Neuron) and the [`Layer`](layers::Layer) trait
//! - [`backend`] — process-wide backend selection
//! - [`config`] — layer construction settings
//! - [`error`] — the crate's [`Error`](error::Error)
//! - [`approx`] — tolerance comparisons for tests and callers
//!
//! ## Feature Flags
//!
//! - `wgpu` — enables the GPU backend
//! - `fixed-rand` — layers default to a fixed seed, making initial weights
//!   reproducible

#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::many_single_char_names,
    clippy::cast_possible_truncation,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions
)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod approx;
pub mod backend;
pub mod config;
pub mod error;
pub mod layers;
pub mod math;
pub mod matrix;
pub mod ops;
pub mod real;

pub use error::{Error, Result};
pub use matrix::{Extent, Matrix};
pub use real::Real;
