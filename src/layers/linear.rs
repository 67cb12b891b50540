//! Linear Layer (Fully Connected)
//!
//! Performs an affine transformation over the last axis: `y = x @ W + b`.
//!
//! ```text
//! Input:  x [*, in_features]
//! Weight: W [in_features, out_features]
//! Bias:   b [out_features]            (optional)
//! Output: y [*, out_features]
//! ```
//!
//! Leading dimensions are flattened into rows for a single 2D matmul and
//! restored afterwards, so the same layer serves `[batch, seq, dim]` inputs and
//! the `[batch, seq, heads, head_dim]` head slices used by attention.

use crate::error::{Error, Result};
use crate::rng::ParamInit;
use crate::tensor::Tensor;

/// Linear layer (fully connected)
pub struct Linear {
    /// Weight matrix: [in_features, out_features]
    pub weight: Tensor,
    /// Bias vector: [out_features], absent for bias-free projections
    pub bias: Option<Tensor>,
}

impl Linear {
    /// Create a new linear layer
    ///
    /// Weights are drawn from the initializer's normal distribution and the
    /// bias, if any, starts at zero.
    pub fn new(in_features: usize, out_features: usize, bias: bool, init: &mut ParamInit) -> Self {
        let weight = Tensor::new(
            init.normal(in_features * out_features),
            vec![in_features, out_features],
        );
        let bias = bias.then(|| Tensor::zeros(vec![out_features]));
        Self { weight, bias }
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape[0]
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape[1]
    }

    /// Forward pass: y = x @ W (+ b)
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the last axis of `x` is not `in_features`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let in_features = self.in_features();
        if x.shape.is_empty() || x.last_dim() != in_features {
            let mut expected = x.shape.clone();
            match expected.last_mut() {
                Some(last) => *last = in_features,
                None => expected.push(in_features),
            }
            return Err(Error::ShapeMismatch {
                expected,
                got: x.shape.clone(),
            });
        }

        let rows = x.numel() / in_features.max(1);
        let x_2d = x.reshape(&[rows, in_features]);
        let y_2d = x_2d.matmul(&self.weight);

        let mut out_shape = x.shape.clone();
        if let Some(last) = out_shape.last_mut() {
            *last = self.out_features();
        }
        let y = y_2d.reshape(&out_shape);

        Ok(match &self.bias {
            Some(bias) => y.add(bias),
            None => y,
        })
    }

    /// Number of learnable parameters
    pub fn num_parameters(&self) -> usize {
        self.weight.numel() + self.bias.as_ref().map_or(0, Tensor::numel)
    }
}
