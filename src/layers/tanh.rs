use super::{Activation, ActivationState};
use crate::error::Result;
use crate::math;
use crate::real::Real;

/// Hyperbolic tangent; derivative `1 − y ⊙ y`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Activation for Tanh {
    const NAME: &'static str = "tanh";
    const UNIFORM_RANGE: (f64, f64) = (-1.0, 1.0);

    fn activate<T: Real>(state: &mut ActivationState<T>) -> Result<()> {
        math::tanh(&state.z, &mut state.y)
    }

    fn activate_derivative<T: Real>(state: &mut ActivationState<T>) -> Result<()> {
        math::hadamard_product(&state.y, &state.y, &mut state.scratch)?;
        math::sub(&state.ones, &state.scratch, &mut state.derivative)
    }
}
