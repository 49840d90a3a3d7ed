use super::{Activation, ActivationState};
use crate::error::Result;
use crate::math;
use crate::real::Real;

/// Rectified linear unit.
///
/// The derivative is taken from `z` and is `1` at exactly zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Activation for Relu {
    const NAME: &'static str = "relu";
    const UNIFORM_RANGE: (f64, f64) = (-1.0, 1.0);

    fn activate<T: Real>(state: &mut ActivationState<T>) -> Result<()> {
        math::relu(&state.z, &mut state.y)
    }

    fn activate_derivative<T: Real>(state: &mut ActivationState<T>) -> Result<()> {
        math::relu_derivative(&state.z, &mut state.derivative)
    }
}
