//! Reusable buffer arena for layer state.
//!
//! Layers built with [`Neuron::new_in`](super::Neuron::new_in) draw their
//! batch buffers from a [`BufferPool`] and hand them back with
//! [`Neuron::recycle`](super::Neuron::recycle), so rebuilding a network of
//! the same shape does not reallocate. A buffer is owned by exactly one place
//! at a time: it is moved out on `acquire` and moved back on `release`.
//!
//! Pooled buffers keep whatever they held when released; use
//! [`BufferPool::acquire_filled`] when the previous contents must not show.

use crate::matrix::{Extent, Matrix};
use crate::real::Real;
use std::collections::HashMap;
use tracing::trace;

/// What a pooled buffer is used for inside a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    /// `x · W` before the bias is added.
    Product,
    /// Bias broadcast over every batch row.
    BiasRows,
    /// Pre-activation `z`.
    PreActivation,
    /// Post-activation `y`.
    Activation,
    /// Local derivative of the activation.
    Derivative,
    /// Intermediate term of a derivative (`t_y`).
    Scratch,
    /// Constant ones.
    Ones,
    /// Upstream error times the derivative.
    Delta,
    /// Error handed to the previous layer.
    InputError,
}

/// Idle buffers keyed by extent and role.
#[derive(Debug)]
pub struct BufferPool<T> {
    idle: HashMap<(Extent, BufferRole), Vec<Matrix<T>>>,
}

impl<T: Real> BufferPool<T> {
    /// An empty pool.
    pub fn new() -> Self {
        Self {
            idle: HashMap::new(),
        }
    }

    /// Takes an idle buffer of `extent` for `role`, or allocates a zeroed one.
    pub fn acquire(&mut self, extent: Extent, role: BufferRole) -> Matrix<T> {
        match self.idle.get_mut(&(extent, role)).and_then(Vec::pop) {
            Some(m) => {
                trace!(%extent, ?role, "pool hit");
                m
            }
            None => Matrix::zeros(extent),
        }
    }

    /// Like [`acquire`](Self::acquire), with every element set to `value`.
    pub fn acquire_filled(&mut self, extent: Extent, role: BufferRole, value: T) -> Matrix<T> {
        let mut m = self.acquire(extent, role);
        m.fill(value);
        m
    }

    /// Returns a buffer to the pool.
    pub fn release(&mut self, role: BufferRole, buffer: Matrix<T>) {
        self.idle
            .entry((buffer.extent(), role))
            .or_default()
            .push(buffer);
    }

    /// Idle buffers of `extent` for `role`.
    pub fn idle(&self, extent: Extent, role: BufferRole) -> usize {
        self.idle.get(&(extent, role)).map_or(0, Vec::len)
    }

    /// Idle buffers across every key.
    pub fn idle_total(&self) -> usize {
        self.idle.values().map(Vec::len).sum()
    }
}

impl<T: Real> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_then_acquire_reuses_the_allocation() {
        let mut pool = BufferPool::<f32>::new();
        let e = Extent::new(4, 3);
        let buf = pool.acquire(e, BufferRole::Activation);
        let ptr = buf.as_slice().as_ptr();
        pool.release(BufferRole::Activation, buf);
        assert_eq!(pool.idle(e, BufferRole::Activation), 1);

        let again = pool.acquire(e, BufferRole::Activation);
        assert_eq!(again.as_slice().as_ptr(), ptr);
        assert_eq!(pool.idle_total(), 0);
    }

    #[test]
    fn acquire_filled_clears_stale_contents() {
        let mut pool = BufferPool::<f32>::new();
        let e = Extent::new(2, 2);
        pool.release(BufferRole::Delta, Matrix::filled(2, 2, 7.0));
        let m = pool.acquire_filled(e, BufferRole::Delta, 0.0);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn keys_separate_roles_and_extents() {
        let mut pool = BufferPool::<f64>::new();
        pool.release(BufferRole::Ones, Matrix::filled(2, 2, 1.0));
        assert_eq!(pool.idle(Extent::new(2, 2), BufferRole::Scratch), 0);
        assert_eq!(pool.idle(Extent::new(1, 4), BufferRole::Ones), 0);
        // different role allocates fresh
        let fresh = pool.acquire(Extent::new(2, 2), BufferRole::Scratch);
        assert!(fresh.as_slice().iter().all(|&v| v == 0.0));
        assert_eq!(pool.idle_total(), 1);
    }
}
