use super::{Activation, ActivationState};
use crate::error::Result;
use crate::math;
use crate::real::Real;

/// Logistic sigmoid.
///
/// The derivative is expressed through the layer's own output,
/// `y ⊙ (1 − y)`, with `1 − y` staged in the scratch buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logistic;

impl Activation for Logistic {
    const NAME: &'static str = "logistic";
    const UNIFORM_RANGE: (f64, f64) = (0.0, 1.0);

    fn activate<T: Real>(state: &mut ActivationState<T>) -> Result<()> {
        math::logistic(&state.z, &mut state.y)
    }

    fn activate_derivative<T: Real>(state: &mut ActivationState<T>) -> Result<()> {
        math::sub(&state.ones, &state.y, &mut state.scratch)?;
        math::hadamard_product(&state.y, &state.scratch, &mut state.derivative)
    }
}
