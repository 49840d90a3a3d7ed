//! Weight initialisation.

use crate::config::{InitPolicy, SeedMode};
use crate::matrix::{Extent, Matrix};
use crate::real::Real;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Builds the generator for one layer.
pub fn rng(seed: SeedMode) -> StdRng {
    match seed {
        SeedMode::Fixed(seed) => StdRng::seed_from_u64(seed),
        SeedMode::Entropy => StdRng::from_os_rng(),
    }
}

/// Draws a matrix of initial weights.
///
/// `Uniform` samples `[low, high)` from `range`; `ScaledNormal` samples
/// `N(0, sqrt(2 / n))` with `n = extent.len()`.
pub fn weights<T: Real>(
    extent: Extent,
    policy: InitPolicy,
    (low, high): (f64, f64),
    rng: &mut StdRng,
) -> Matrix<T> {
    let mut m = Matrix::zeros(extent);
    match policy {
        InitPolicy::Uniform => {
            for w in m.as_mut_slice() {
                *w = T::from_f64(rng.random_range(low..high));
            }
        }
        InitPolicy::ScaledNormal => {
            let sigma = (2.0 / extent.len().max(1) as f64).sqrt();
            for w in m.as_mut_slice() {
                let z: f64 = rng.sample(StandardNormal);
                *w = T::from_f64(z * sigma);
            }
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_seed_is_reproducible() {
        let e = Extent::new(5, 4);
        let a: Matrix<f32> = weights(e, InitPolicy::Uniform, (-1.0, 1.0), &mut rng(SeedMode::Fixed(1)));
        let b: Matrix<f32> = weights(e, InitPolicy::Uniform, (-1.0, 1.0), &mut rng(SeedMode::Fixed(1)));
        let c: Matrix<f32> = weights(e, InitPolicy::Uniform, (-1.0, 1.0), &mut rng(SeedMode::Fixed(2)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn uniform_respects_range() {
        let m: Matrix<f64> = weights(
            Extent::new(32, 32),
            InitPolicy::Uniform,
            (0.0, 1.0),
            &mut rng(SeedMode::Fixed(9)),
        );
        assert!(m.as_slice().iter().all(|&w| (0.0..1.0).contains(&w)));
    }

    #[test]
    fn scaled_normal_spread_tracks_size() {
        let e = Extent::new(50, 40);
        let m: Matrix<f64> = weights(e, InitPolicy::ScaledNormal, (0.0, 1.0), &mut rng(SeedMode::Fixed(3)));
        let n = m.len() as f64;
        let mean = m.as_slice().iter().sum::<f64>() / n;
        let var = m.as_slice().iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n;
        let expected = 2.0 / n;
        assert!(mean.abs() < 0.01, "mean {mean}");
        assert!((var - expected).abs() < expected * 0.2, "variance {var}, expected {expected}");
        // ignores the uniform range entirely
        assert!(m.as_slice().iter().any(|&w| w < 0.0));
    }
}
