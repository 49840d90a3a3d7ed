//! Dense neuron layers.
//!
//! A [`Neuron`] owns one layer's weights, bias and every per-batch buffer,
//! and delegates all numeric work to [`crate::math`]. The nonlinearity is a
//! type parameter implementing [`Activation`]; the variants only differ in
//! their two hooks and their initial weight range:
//!
//! | variant      | `activate`     | `activate_derivative` | uniform range |
//! |--------------|----------------|-----------------------|---------------|
//! | [`Relu`]     | `max(0, z)`    | from `z`: `z < 0 ? 0 : 1` | `[-1, 1)` |
//! | [`Logistic`] | `1/(1+e^-z)`   | from `y`: `y ⊙ (1 − y)`   | `[0, 1)`  |
//! | [`Tanh`]     | `tanh(z)`      | from `y`: `1 − y ⊙ y`     | `[-1, 1)` |
//!
//! Every buffer has a fixed extent for the layer's lifetime: `z`, `y`, the
//! derivative and the scratch buffers are all `batch_size x output_size`.
//! `forward` overwrites `z` then `y`; `backward` overwrites the derivative and
//! must follow the `forward` whose output it differentiates.
//!
//! ```rust
//! use nnet::config::{LayerConfig, SeedMode};
//! use nnet::layers::ReluLayer;
//! use nnet::matrix;
//!
//! let cfg = LayerConfig::new(1).with_seed(SeedMode::Fixed(1));
//! let mut layer = ReluLayer::<f32>::new(3, 2, &cfg).unwrap();
//! let y = layer.forward(&matrix![[1.0, -2.0, 3.0]]).unwrap();
//! assert_eq!(y.extent(), nnet::matrix::Extent::new(1, 2));
//! ```

mod logistic;
mod relu;
mod tanh;

pub mod init;
pub mod pool;

pub use logistic::Logistic;
pub use relu::Relu;
pub use tanh::Tanh;

use crate::config::{LayerConfig, MatMulStrategy};
use crate::error::{Error, Result};
use crate::math;
use crate::matrix::{Extent, Matrix};
use crate::real::Real;
use core::marker::PhantomData;
use pool::{BufferPool, BufferRole};
use tracing::debug;

/// The batch buffers an activation reads and writes.
///
/// All five share one extent.
#[derive(Debug, Clone)]
pub struct ActivationState<T> {
    /// Pre-activation.
    pub z: Matrix<T>,
    /// Post-activation.
    pub y: Matrix<T>,
    /// Local derivative.
    pub derivative: Matrix<T>,
    /// Intermediate term (`t_y`).
    pub scratch: Matrix<T>,
    /// All ones.
    pub ones: Matrix<T>,
}

/// A nonlinearity and its derivative, expressed with engine operations.
pub trait Activation: Send + Sync + 'static {
    /// Display name.
    const NAME: &'static str;

    /// Range `[low, high)` of [`InitPolicy::Uniform`](crate::config::InitPolicy::Uniform)
    /// weights.
    const UNIFORM_RANGE: (f64, f64);

    /// `y = f(z)`.
    ///
    /// # Errors
    /// Propagates engine failures.
    fn activate<T: Real>(state: &mut ActivationState<T>) -> Result<()>;

    /// Writes `f'` into `state.derivative`, leaving `z` and `y` untouched.
    ///
    /// # Errors
    /// Propagates engine failures.
    fn activate_derivative<T: Real>(state: &mut ActivationState<T>) -> Result<()>;
}

/// One dense layer with activation `A` over elements of type `T`.
#[derive(Debug)]
pub struct Neuron<A, T> {
    input_size: usize,
    output_size: usize,
    batch_size: usize,
    matmul: MatMulStrategy,
    weights: Matrix<T>,
    weights_t: Matrix<T>,
    bias: Matrix<T>,
    bias_rows: Matrix<T>,
    product: Matrix<T>,
    state: ActivationState<T>,
    delta: Matrix<T>,
    input_error: Matrix<T>,
    _activation: PhantomData<A>,
}

/// Rectified-linear layer.
pub type ReluLayer<T = f32> = Neuron<Relu, T>;
/// Logistic (sigmoid) layer.
pub type LogisticLayer<T = f32> = Neuron<Logistic, T>;
/// Hyperbolic-tangent layer.
pub type TanhLayer<T = f32> = Neuron<Tanh, T>;

impl<A: Activation, T: Real> Neuron<A, T> {
    /// Builds a layer with freshly allocated buffers.
    ///
    /// # Errors
    /// [`Error::InvalidLayerShape`] if any size is zero.
    pub fn new(input_size: usize, output_size: usize, config: &LayerConfig) -> Result<Self> {
        Self::new_in(&mut BufferPool::new(), input_size, output_size, config)
    }

    /// Builds a layer whose batch buffers come from `pool`.
    ///
    /// Reused buffers are cleared, so `z`, `y` and the derivative read as
    /// zero until the first pass.
    ///
    /// # Errors
    /// [`Error::InvalidLayerShape`] if any size is zero.
    pub fn new_in(
        pool: &mut BufferPool<T>,
        input_size: usize,
        output_size: usize,
        config: &LayerConfig,
    ) -> Result<Self> {
        let batch_size = config.batch_size;
        if input_size == 0 || output_size == 0 || batch_size == 0 {
            return Err(Error::InvalidLayerShape {
                input_size,
                output_size,
                batch_size,
            });
        }

        let shape = Extent::new(input_size, output_size);
        let mut rng = init::rng(config.seed);
        let weights = init::weights(shape, config.init, A::UNIFORM_RANGE, &mut rng);
        let mut weights_t = Matrix::zeros(shape.transposed());
        math::transpose(&weights, &mut weights_t)?;

        let batch = Extent::new(batch_size, output_size);
        let mut zeroed = |extent: Extent, role: BufferRole| pool.acquire_filled(extent, role, T::ZERO);
        let bias_rows = zeroed(batch, BufferRole::BiasRows);
        let product = zeroed(batch, BufferRole::Product);
        let z = zeroed(batch, BufferRole::PreActivation);
        let y = zeroed(batch, BufferRole::Activation);
        let derivative = zeroed(batch, BufferRole::Derivative);
        let scratch = zeroed(batch, BufferRole::Scratch);
        let delta = zeroed(batch, BufferRole::Delta);
        let input_error = zeroed(Extent::new(batch_size, input_size), BufferRole::InputError);
        let ones = pool.acquire_filled(batch, BufferRole::Ones, T::ONE);

        debug!(
            activation = A::NAME,
            input_size,
            output_size,
            batch_size,
            init = ?config.init,
            seed = ?config.seed,
            "layer created"
        );

        Ok(Self {
            input_size,
            output_size,
            batch_size,
            matmul: config.matmul,
            weights,
            weights_t,
            bias: Matrix::new(1, output_size),
            bias_rows,
            product,
            state: ActivationState {
                z,
                y,
                derivative,
                scratch,
                ones,
            },
            delta,
            input_error,
            _activation: PhantomData,
        })
    }

    /// `y = f(z)`.
    ///
    /// # Errors
    /// Propagates engine failures.
    pub fn activate(&mut self) -> Result<()> {
        A::activate(&mut self.state)
    }

    /// Writes `f'` into the derivative buffer.
    ///
    /// # Errors
    /// Propagates engine failures.
    pub fn activate_derivative(&mut self) -> Result<()> {
        A::activate_derivative(&mut self.state)
    }

    /// `y = f(x · W + b)` for one batch.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if `input` is not `batch_size x input_size`.
    pub fn forward(&mut self, input: &Matrix<T>) -> Result<&Matrix<T>> {
        match self.matmul {
            MatMulStrategy::Tiled => math::matrix_mult_tiled(input, &self.weights, &mut self.product)?,
            MatMulStrategy::Naive => math::matrix_mult(input, &self.weights, &mut self.product)?,
        }
        math::add(&self.product, &self.bias_rows, &mut self.state.z)?;
        self.activate()?;
        Ok(&self.state.y)
    }

    /// Local derivative of the last `forward`.
    ///
    /// # Errors
    /// Propagates engine failures.
    pub fn backward(&mut self) -> Result<&Matrix<T>> {
        self.activate_derivative()?;
        Ok(&self.state.derivative)
    }

    /// `upstream ⊙ f'`, using the derivative from the last `backward`.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if `upstream` is not `batch_size x output_size`.
    pub fn delta(&mut self, upstream: &Matrix<T>) -> Result<&Matrix<T>> {
        math::hadamard_product(upstream, &self.state.derivative, &mut self.delta)?;
        Ok(&self.delta)
    }

    /// Error for the previous layer: `(upstream ⊙ f') · Wᵀ`.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if `upstream` is not `batch_size x output_size`.
    pub fn propagate(&mut self, upstream: &Matrix<T>) -> Result<&Matrix<T>> {
        self.delta(upstream)?;
        match self.matmul {
            MatMulStrategy::Tiled => {
                math::matrix_mult_tiled(&self.delta, &self.weights_t, &mut self.input_error)?;
            }
            MatMulStrategy::Naive => {
                math::matrix_mult(&self.delta, &self.weights_t, &mut self.input_error)?;
            }
        }
        Ok(&self.input_error)
    }

    /// Replaces the weights.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] unless `weights` is `input_size x output_size`.
    pub fn set_weights(&mut self, weights: Matrix<T>) -> Result<()> {
        let expected = self.weights.extent();
        if weights.extent() != expected {
            return Err(Error::DimensionMismatch {
                op: "set_weights",
                expected,
                found: weights.extent(),
            });
        }
        math::transpose(&weights, &mut self.weights_t)?;
        self.weights = weights;
        Ok(())
    }

    /// Replaces the bias.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] unless `bias` is `1 x output_size`.
    pub fn set_bias(&mut self, bias: Matrix<T>) -> Result<()> {
        let expected = self.bias.extent();
        if bias.extent() != expected {
            return Err(Error::DimensionMismatch {
                op: "set_bias",
                expected,
                found: bias.extent(),
            });
        }
        for row in self.bias_rows.as_mut_slice().chunks_exact_mut(self.output_size) {
            row.copy_from_slice(bias.as_slice());
        }
        self.bias = bias;
        Ok(())
    }

    /// Hands every batch buffer back to `pool`.
    pub fn recycle(self, pool: &mut BufferPool<T>) {
        let ActivationState {
            z,
            y,
            derivative,
            scratch,
            ones,
        } = self.state;
        pool.release(BufferRole::Product, self.product);
        pool.release(BufferRole::BiasRows, self.bias_rows);
        pool.release(BufferRole::PreActivation, z);
        pool.release(BufferRole::Activation, y);
        pool.release(BufferRole::Derivative, derivative);
        pool.release(BufferRole::Scratch, scratch);
        pool.release(BufferRole::Ones, ones);
        pool.release(BufferRole::Delta, self.delta);
        pool.release(BufferRole::InputError, self.input_error);
    }

    /// Pre-activation of the last forward pass.
    pub fn z(&self) -> &Matrix<T> {
        &self.state.z
    }

    /// Activation of the last forward pass.
    pub fn y(&self) -> &Matrix<T> {
        &self.state.y
    }

    /// Derivative of the last backward pass.
    pub fn derivative(&self) -> &Matrix<T> {
        &self.state.derivative
    }

    /// `input_size x output_size` weights.
    pub fn weights(&self) -> &Matrix<T> {
        &self.weights
    }

    /// `1 x output_size` bias.
    pub fn bias(&self) -> &Matrix<T> {
        &self.bias
    }

    /// Width of each input row.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Width of each output row.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Rows per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Object-safe view of any [`Neuron`], for heterogeneous stacks.
pub trait Layer<T: Real>: Send + Sync {
    /// Name of the activation.
    fn name(&self) -> &'static str;

    /// See [`Neuron::forward`].
    ///
    /// # Errors
    /// As [`Neuron::forward`].
    fn forward(&mut self, input: &Matrix<T>) -> Result<&Matrix<T>>;

    /// See [`Neuron::backward`].
    ///
    /// # Errors
    /// As [`Neuron::backward`].
    fn backward(&mut self) -> Result<&Matrix<T>>;

    /// See [`Neuron::propagate`].
    ///
    /// # Errors
    /// As [`Neuron::propagate`].
    fn propagate(&mut self, upstream: &Matrix<T>) -> Result<&Matrix<T>>;

    /// Activation of the last forward pass.
    fn y(&self) -> &Matrix<T>;
    /// Derivative of the last backward pass.
    fn derivative(&self) -> &Matrix<T>;
    /// Current weights.
    fn weights(&self) -> &Matrix<T>;
    /// Width of each input row.
    fn input_size(&self) -> usize;
    /// Width of each output row.
    fn output_size(&self) -> usize;
}

impl<A: Activation, T: Real> Layer<T> for Neuron<A, T> {
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn forward(&mut self, input: &Matrix<T>) -> Result<&Matrix<T>> {
        Neuron::forward(self, input)
    }

    fn backward(&mut self) -> Result<&Matrix<T>> {
        Neuron::backward(self)
    }

    fn propagate(&mut self, upstream: &Matrix<T>) -> Result<&Matrix<T>> {
        Neuron::propagate(self, upstream)
    }

    fn y(&self) -> &Matrix<T> {
        Neuron::y(self)
    }

    fn derivative(&self) -> &Matrix<T> {
        Neuron::derivative(self)
    }

    fn weights(&self) -> &Matrix<T> {
        Neuron::weights(self)
    }

    fn input_size(&self) -> usize {
        Neuron::input_size(self)
    }

    fn output_size(&self) -> usize {
        Neuron::output_size(self)
    }
}
