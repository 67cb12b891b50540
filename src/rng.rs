//! Seeded randomness
//!
//! All randomness in the crate flows from a single `u64` seed: parameter
//! initialization draws from it directly, and every dropout layer receives its
//! own [`StdRng`] forked from it at construction time. Two models built from
//! the same configuration are therefore bit-identical, and so are their
//! training-mode forward passes when called in the same order.

use crate::error::{Error, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Parameter initializer
///
/// Weights are drawn from `N(0, std)`. Biases, layer-norm shifts and scales
/// are set by the layers themselves and do not consume randomness.
pub struct ParamInit {
    rng: StdRng,
    normal: Normal<f32>,
}

impl ParamInit {
    /// Create an initializer from a seed and a standard deviation
    ///
    /// Fails if `std` is negative or not finite.
    pub fn new(seed: u64, std: f32) -> Result<Self> {
        let normal = Normal::new(0.0, std)
            .map_err(|e| Error::invalid_config(format!("init_std {std}: {e}")))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            normal,
        })
    }

    /// Draw `len` weights from the normal distribution
    pub fn normal(&mut self, len: usize) -> Vec<f32> {
        (0..len).map(|_| self.normal.sample(&mut self.rng)).collect()
    }

    /// Fork an independent generator, e.g. for a dropout layer
    pub fn fork(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.rng.random::<u64>())
    }
}
