//! Dropout Layer
//!
//! Dropout randomly zeros activations during training and scales the
//! survivors by `1 / (1 - rate)` so the expected activation is unchanged
//! ("inverted" dropout). In eval mode it passes values through unchanged.
//!
//! Each layer owns a seeded generator, so training-mode passes are
//! reproducible for a given model seed and call order.

use crate::tensor::Tensor;
use rand::{rngs::StdRng, Rng};
use std::sync::Mutex;

/// Dropout layer with a train/eval switch
pub struct Dropout {
    pub rate: f32,
    pub training: bool,
    rng: Mutex<StdRng>,
}

impl Dropout {
    /// Create a new dropout layer in training mode
    ///
    /// # Arguments
    ///
    /// * `rate` - Dropout probability (0.0 = no dropout, 1.0 = drop all);
    ///   validated by the model configuration
    /// * `rng` - Generator that decides which elements are dropped
    pub fn new(rate: f32, rng: StdRng) -> Self {
        Self {
            rate,
            training: true,
            rng: Mutex::new(rng),
        }
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        if !self.training || self.rate == 0.0 {
            return x.clone();
        }

        if self.rate >= 1.0 {
            return Tensor::zeros(x.shape.clone());
        }

        let scale = 1.0 / (1.0 - self.rate);
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let data = x
            .data
            .iter()
            .map(|&v| {
                let keep = rng.random::<f32>() >= self.rate;
                if keep {
                    v * scale
                } else {
                    0.0
                }
            })
            .collect();

        Tensor::new(data, x.shape.clone())
    }
}
