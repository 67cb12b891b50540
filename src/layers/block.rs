//! Transformer Block
//!
//! Attention and a feed-forward network, each followed by a residual
//! connection and layer normalization (post-norm):
//!
//! ```text
//! value, key, query
//!   ↓
//! Attention ──→ (+ query) → LayerNorm → Dropout ─┬─→ FeedForward → (+) → LayerNorm → Dropout → out
//!                                                └──────────────────↑
//! ```
//!
//! The first residual adds the *query*, not the value or key. In the
//! decoder's cross-attention the query is the decoder state while value and
//! key come from the encoder, so the residual stream stays on the decoder
//! side.

use super::attention::MultiHeadAttention;
use super::dropout::Dropout;
use super::feed_forward::FeedForward;
use super::layer_norm::LayerNorm;
use crate::error::Result;
use crate::mask::Mask;
use crate::rng::ParamInit;
use crate::tensor::Tensor;

/// Post-norm transformer block
pub struct TransformerBlock {
    pub attention: MultiHeadAttention,
    pub norm1: LayerNorm,
    pub norm2: LayerNorm,
    pub feed_forward: FeedForward,
    pub dropout: Dropout,
}

impl TransformerBlock {
    /// Create a new transformer block
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `heads` does not divide `embed_size`.
    pub fn new(
        embed_size: usize,
        heads: usize,
        dropout_rate: f32,
        forward_expansion: usize,
        init: &mut ParamInit,
    ) -> Result<Self> {
        Ok(Self {
            attention: MultiHeadAttention::new(embed_size, heads, init)?,
            norm1: LayerNorm::new(embed_size),
            norm2: LayerNorm::new(embed_size),
            feed_forward: FeedForward::new(embed_size, forward_expansion, init),
            dropout: Dropout::new(dropout_rate, init.fork()),
        })
    }

    /// Forward pass, output has the shape of `query`
    pub fn forward(
        &self,
        value: &Tensor,
        key: &Tensor,
        query: &Tensor,
        mask: Option<&Mask>,
    ) -> Result<Tensor> {
        self.forward_with_attention(value, key, query, mask)
            .map(|(out, _)| out)
    }

    /// Forward pass that also returns the attention weights [N, H, Q, K]
    pub fn forward_with_attention(
        &self,
        value: &Tensor,
        key: &Tensor,
        query: &Tensor,
        mask: Option<&Mask>,
    ) -> Result<(Tensor, Tensor)> {
        let (attn_out, weights) = self.attention.forward(value, key, query, mask)?;
        let x = self
            .dropout
            .forward(&self.norm1.forward(&attn_out.add(query))?);

        let forward = self.feed_forward.forward(&x)?;
        let out = self.dropout.forward(&self.norm2.forward(&forward.add(&x))?);

        Ok((out, weights))
    }

    pub fn set_training(&mut self, training: bool) {
        self.dropout.training = training;
    }

    pub fn num_parameters(&self) -> usize {
        self.attention.num_parameters()
            + self.norm1.num_parameters()
            + self.norm2.num_parameters()
            + self.feed_forward.num_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(seed: u64, dropout_rate: f32) -> TransformerBlock {
        let mut init = ParamInit::new(seed, 0.3).unwrap();
        TransformerBlock::new(8, 2, dropout_rate, 2, &mut init).unwrap()
    }

    fn input(n: usize, len: usize, offset: f32) -> Tensor {
        let data = (0..n * len * 8).map(|i| (i as f32 * 0.21 + offset).cos()).collect();
        Tensor::new(data, vec![n, len, 8])
    }

    #[test]
    fn test_output_shape_follows_query() {
        let mut b = block(1, 0.1);
        b.set_training(false);
        let enc = input(2, 5, 0.0);
        let query = input(2, 3, 1.0);
        let out = b.forward(&enc, &enc, &query, None).unwrap();
        assert_eq!(out.shape, query.shape);
    }

    /// Zero feed-forward, attention output fixed to `fc_out`'s bias
    fn constant_attention_block(bias: Vec<f32>) -> TransformerBlock {
        let mut b = block(2, 0.5);
        b.set_training(false);
        for layer in [&mut b.feed_forward.fc1, &mut b.feed_forward.fc2] {
            layer.weight = Tensor::zeros(layer.weight.shape.clone());
            layer.bias = layer.bias.take().map(|t| Tensor::zeros(t.shape));
        }
        b.attention.fc_out.weight = Tensor::zeros(vec![8, 8]);
        b.attention.fc_out.bias = Some(Tensor::new(bias, vec![8]));
        b
    }

    fn assert_rows(out: &Tensor, expected: &[f32]) {
        for row in out.data.chunks(8) {
            for (o, e) in row.iter().zip(expected) {
                assert!((o - e).abs() < 1e-4, "{o} vs {e}");
            }
        }
    }

    #[test]
    fn test_zero_feed_forward_closed_form() {
        // attn + query = [0, 0, 0, 0, 8, 8, 8, 8] per position: mean 4, std 4
        let b = constant_attention_block(vec![-1.0, -2.0, -3.0, -4.0, 3.0, 2.0, 1.0, 0.0]);
        let row = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let query = Tensor::new(row.repeat(2), vec![1, 2, 8]);
        let kv = input(1, 3, 0.0);

        let out = b.forward(&kv, &kv, &query, None).unwrap();
        assert_eq!(out.shape, vec![1, 2, 8]);
        assert_rows(&out, &[-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_residual_uses_query() {
        // Attention contributes nothing, so the output is the normalized
        // query; the value rows have the opposite sign pattern
        let b = constant_attention_block(vec![0.0; 8]);
        let query_row = [1.0, 1.0, 1.0, 1.0, 5.0, 5.0, 5.0, 5.0];
        let value_row = [5.0, 5.0, 5.0, 5.0, 1.0, 1.0, 1.0, 1.0];
        let query = Tensor::new(query_row.repeat(2), vec![1, 2, 8]);
        let kv = Tensor::new(value_row.repeat(2), vec![1, 2, 8]);

        let out = b.forward(&kv, &kv, &query, None).unwrap();
        assert_rows(&out, &[-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_eval_is_deterministic() {
        let mut b = block(4, 0.5);
        b.set_training(false);
        let x = input(2, 3, 0.0);
        let first = b.forward(&x, &x, &x, None).unwrap();
        let second = b.forward(&x, &x, &x, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_training_dropout_changes_output() {
        let mut b = block(5, 0.5);
        let x = input(2, 3, 0.0);
        let train = b.forward(&x, &x, &x, None).unwrap();
        b.set_training(false);
        let eval = b.forward(&x, &x, &x, None).unwrap();
        assert_ne!(train, eval);
        assert!(train.data.iter().any(|&v| v == 0.0));
    }

    #[test]
    fn test_weights_returned() {
        let b = block(6, 0.0);
        let x = input(1, 3, 0.0);
        let (_, weights) = b.forward_with_attention(&x, &x, &x, None).unwrap();
        assert_eq!(weights.shape, vec![1, 2, 3, 3]);
    }
}
