//! Layer Normalization
//!
//! Normalizes activations along the last axis to zero mean and unit variance,
//! then applies a learnable scale (gamma) and shift (beta).
//!
//! ```text
//! 1. mean = sum(x) / N
//! 2. var  = sum((x - mean)²) / N          (biased, like PyTorch)
//! 3. x_norm = (x - mean) / √(var + ε)
//! 4. y = γ * x_norm + β
//! ```

use crate::error::{Error, Result};
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Layer normalization layer
pub struct LayerNorm {
    pub gamma: Tensor, // Scale parameter [embed_size]
    pub beta: Tensor,  // Shift parameter [embed_size]
    pub eps: f32,      // Small constant for numerical stability
}

impl LayerNorm {
    /// Create a new layer normalization layer
    ///
    /// gamma starts at 1.0, beta at 0.0 and eps is 1e-5.
    pub fn new(normalized_shape: usize) -> Self {
        Self {
            gamma: Tensor::new(vec![1.0; normalized_shape], vec![normalized_shape]),
            beta: Tensor::zeros(vec![normalized_shape]),
            eps: 1e-5,
        }
    }

    /// Normalize every row of the last axis independently
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let dim = self.gamma.numel();
        if x.shape.is_empty() || x.last_dim() != dim {
            return Err(Error::ShapeMismatch {
                expected: vec![dim],
                got: x.shape.clone(),
            });
        }

        let mut out = vec![0.0; x.numel()];
        out.par_chunks_mut(dim)
            .zip(x.data.par_chunks(dim))
            .for_each(|(out_row, row)| {
                let mean = row.iter().sum::<f32>() / dim as f32;
                let var = row
                    .iter()
                    .map(|&v| {
                        let diff = v - mean;
                        diff * diff
                    })
                    .sum::<f32>()
                    / dim as f32;
                let std = (var + self.eps).sqrt();

                for (j, o) in out_row.iter_mut().enumerate() {
                    *o = (row[j] - mean) / std * self.gamma.data[j] + self.beta.data[j];
                }
            });

        Ok(Tensor::new(out, x.shape.clone()))
    }

    pub fn num_parameters(&self) -> usize {
        self.gamma.numel() + self.beta.numel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_normalized() {
        let ln = LayerNorm::new(4);
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 10.0, 10.0, 10.0, 14.0], vec![1, 2, 4]);
        let y = ln.forward(&x).unwrap();

        for row in y.data.chunks(4) {
            let mean: f32 = row.iter().sum::<f32>() / 4.0;
            let var: f32 = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
            assert!(mean.abs() < 1e-5);
            assert!((var - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_gamma_beta_applied() {
        let mut ln = LayerNorm::new(2);
        ln.gamma = Tensor::new(vec![2.0, 2.0], vec![2]);
        ln.beta = Tensor::new(vec![1.0, 1.0], vec![2]);
        let y = ln.forward(&Tensor::new(vec![-1.0, 1.0], vec![1, 2])).unwrap();
        // x_norm is roughly [-1, 1]
        assert!((y.data[0] + 1.0).abs() < 1e-3);
        assert!((y.data[1] - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_row_maps_to_beta() {
        let ln = LayerNorm::new(3);
        let y = ln.forward(&Tensor::new(vec![5.0; 3], vec![1, 1, 3])).unwrap();
        assert!(y.data.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_width_mismatch() {
        let ln = LayerNorm::new(3);
        assert!(ln.forward(&Tensor::zeros(vec![1, 4])).is_err());
    }
}
