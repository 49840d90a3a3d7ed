//! Layer construction settings.
//!
//! ```rust
//! use nnet::config::{InitPolicy, LayerConfig, MatMulStrategy, SeedMode};
//! let cfg = LayerConfig::new(4)
//!     .with_seed(SeedMode::Fixed(7))
//!     .with_init(InitPolicy::ScaledNormal)
//!     .with_matmul(MatMulStrategy::Naive);
//! assert_eq!(cfg.batch_size, 4);
//! ```

/// How weight initialisation is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// Reproducible draws from a fixed seed.
    Fixed(u64),
    /// Seeded from the operating system.
    Entropy,
}

impl Default for SeedMode {
    /// `Fixed(1)` with the `fixed-rand` feature, `Entropy` otherwise.
    fn default() -> Self {
        if cfg!(feature = "fixed-rand") {
            Self::Fixed(1)
        } else {
            Self::Entropy
        }
    }
}

/// Distribution initial weights are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitPolicy {
    /// Uniform over the activation's range.
    #[default]
    Uniform,
    /// Normal with mean 0 and standard deviation `sqrt(2 / n)`, `n` the
    /// number of weights drawn.
    ScaledNormal,
}

/// Which product kernel `forward` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatMulStrategy {
    /// One worker per output element.
    Naive,
    /// Shared tiles of `TILE_SIZE`.
    #[default]
    Tiled,
}

/// Everything a layer needs besides its input and output widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerConfig {
    /// Rows per forward pass; fixed for the layer's lifetime.
    pub batch_size: usize,
    /// Seeding of the weight initialiser.
    pub seed: SeedMode,
    /// Distribution of the initial weights.
    pub init: InitPolicy,
    /// Product kernel used by `forward` and `propagate`.
    pub matmul: MatMulStrategy,
}

impl LayerConfig {
    /// Defaults with the given batch size.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// Sets the seeding mode.
    #[must_use]
    pub fn with_seed(mut self, seed: SeedMode) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the initialisation policy.
    #[must_use]
    pub fn with_init(mut self, init: InitPolicy) -> Self {
        self.init = init;
        self
    }

    /// Sets the product kernel.
    #[must_use]
    pub fn with_matmul(mut self, matmul: MatMulStrategy) -> Self {
        self.matmul = matmul;
        self
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            seed: SeedMode::default(),
            init: InitPolicy::default(),
            matmul: MatMulStrategy::default(),
        }
    }
}
