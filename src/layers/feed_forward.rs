//! Position-wise Feed-Forward Network
//!
//! A two-layer network applied independently at every position:
//!
//! ```text
//! x → Linear(E → expansion·E) → ReLU → Linear(expansion·E → E) → y
//! ```

use super::activation::relu;
use super::linear::Linear;
use crate::error::Result;
use crate::rng::ParamInit;
use crate::tensor::Tensor;

/// Feed-forward sub-layer of a transformer block
pub struct FeedForward {
    pub fc1: Linear,
    pub fc2: Linear,
}

impl FeedForward {
    /// Create a feed-forward network with hidden width `forward_expansion * embed_size`
    pub fn new(embed_size: usize, forward_expansion: usize, init: &mut ParamInit) -> Self {
        let hidden = forward_expansion * embed_size;
        Self {
            fc1: Linear::new(embed_size, hidden, true, init),
            fc2: Linear::new(hidden, embed_size, true, init),
        }
    }

    /// Forward pass: x → fc1 → ReLU → fc2
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = relu(&self.fc1.forward(x)?);
        self.fc2.forward(&h)
    }

    pub fn num_parameters(&self) -> usize {
        self.fc1.num_parameters() + self.fc2.num_parameters()
    }
}
