//! Multi-Head Scaled Dot-Product Attention
//!
//! Attention lets every query position gather information from every key
//! position. The same layer is used for self-attention in the encoder
//! (values = keys = query) and for cross-attention in the decoder (values =
//! keys = encoder output, query = decoder state).
//!
//! ## Algorithm
//!
//! ```text
//! 1. reinterpret values/keys/query [N, len, E] as [N, len, H, D]   (D = E / H)
//! 2. project the D axis:  V = values·Wv   K = keys·Wk   Q = query·Wq
//!    (one D×D matrix per role, shared by all heads, no bias)
//! 3. energy[n,h,q,k] = Σ_d Q[n,q,h,d] · K[n,k,h,d]
//! 4. energy[n,h,q,k] = -1e20 where the mask forbids (q, k)
//! 5. attention = softmax(energy / √E) over k
//! 6. out[n,q,h,d] = Σ_k attention[n,h,q,k] · V[n,k,h,d]  →  [N, Q, E]
//! 7. fc_out: Linear(E → E) with bias
//! ```
//!
//! The divisor in step 5 is the square root of the full embedding size, not
//! of the head dimension.
//!
//! ## Masked Rows
//!
//! When every key of a query row is masked, all its scores equal the sentinel
//! and the softmax yields a uniform distribution. That behavior is kept as is.
//!
//! ## Parallelism
//!
//! Scores are computed per (batch, head) slice and the weighted sum per
//! (batch, query) row, each slice on its own Rayon task.

use super::linear::Linear;
use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::rng::ParamInit;
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Score written where the mask forbids a (query, key) pair
pub const MASK_SENTINEL: f32 = -1e20;

/// Multi-head attention over (values, keys, query) triples
pub struct MultiHeadAttention {
    /// Value projection on each head slice: [head_dim, head_dim]
    pub values: Linear,
    /// Key projection on each head slice: [head_dim, head_dim]
    pub keys: Linear,
    /// Query projection on each head slice: [head_dim, head_dim]
    pub queries: Linear,
    /// Output projection after merging heads: [embed_size, embed_size]
    pub fc_out: Linear,
    pub embed_size: usize,
    pub heads: usize,
    pub head_dim: usize,
}

impl MultiHeadAttention {
    /// Create an attention layer
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `heads` is zero or does not divide `embed_size`.
    pub fn new(embed_size: usize, heads: usize, init: &mut ParamInit) -> Result<Self> {
        if heads == 0 || embed_size % heads != 0 {
            return Err(Error::invalid_config(format!(
                "embed_size {embed_size} must be divisible by heads {heads}"
            )));
        }
        let head_dim = embed_size / heads;

        Ok(Self {
            values: Linear::new(head_dim, head_dim, false, init),
            keys: Linear::new(head_dim, head_dim, false, init),
            queries: Linear::new(head_dim, head_dim, false, init),
            fc_out: Linear::new(heads * head_dim, embed_size, true, init),
            embed_size,
            heads,
            head_dim,
        })
    }

    /// Score divisor: `√embed_size`
    pub fn scale(&self) -> f32 {
        (self.embed_size as f32).sqrt()
    }

    /// Compute attention
    ///
    /// # Arguments
    ///
    /// * `values` - [N, len_k, E]
    /// * `keys` - [N, len_k, E]
    /// * `query` - [N, len_q, E]
    /// * `mask` - Optional mask broadcastable to [N, H, len_q, len_k]
    ///
    /// # Returns
    ///
    /// `(output [N, len_q, E], weights [N, H, len_q, len_k])`. The weights are
    /// returned for inspection only.
    pub fn forward(
        &self,
        values: &Tensor,
        keys: &Tensor,
        query: &Tensor,
        mask: Option<&Mask>,
    ) -> Result<(Tensor, Tensor)> {
        self.check_input(values)?;
        self.check_input(keys)?;
        self.check_input(query)?;

        let n = query.shape[0];
        for t in [values, keys] {
            if t.shape[0] != n {
                return Err(Error::BatchMismatch {
                    expected: n,
                    got: t.shape[0],
                });
            }
        }
        let query_len = query.shape[1];
        let key_len = keys.shape[1];
        if values.shape[1] != key_len {
            return Err(Error::ShapeMismatch {
                expected: vec![n, key_len, self.embed_size],
                got: values.shape.clone(),
            });
        }

        let (h, d) = (self.heads, self.head_dim);
        let mask_view = mask
            .map(|m| m.broadcast_to([n, h, query_len, key_len]))
            .transpose()?;

        // [N, len, E] -> [N, len, H, D], then project the D axis
        let v = self.values.forward(&values.reshape(&[n, key_len, h, d]))?;
        let k = self.keys.forward(&keys.reshape(&[n, key_len, h, d]))?;
        let q = self.queries.forward(&query.reshape(&[n, query_len, h, d]))?;

        // energy[n,h,q,k] = Σ_d Q[n,q,h,d] · K[n,k,h,d]
        let mut energy = vec![0.0; n * h * query_len * key_len];
        let slice = query_len * key_len;
        if slice > 0 {
            energy
                .par_chunks_mut(slice)
                .enumerate()
                .for_each(|(bh, chunk)| {
                    let (b, head) = (bh / h, bh % h);
                    for qi in 0..query_len {
                        let q_off = ((b * query_len + qi) * h + head) * d;
                        let q_row = &q.data[q_off..q_off + d];
                        for ki in 0..key_len {
                            let score = match &mask_view {
                                Some(view) if !view.allows(b, head, qi, ki) => MASK_SENTINEL,
                                _ => {
                                    let k_off = ((b * key_len + ki) * h + head) * d;
                                    q_row
                                        .iter()
                                        .zip(&k.data[k_off..k_off + d])
                                        .map(|(x, y)| x * y)
                                        .sum::<f32>()
                                }
                            };
                            chunk[qi * key_len + ki] = score;
                        }
                    }
                });
        }

        let energy = Tensor::new(energy, vec![n, h, query_len, key_len]);
        let attention = energy.div_scalar(self.scale()).softmax_last();

        // out[n,q,h,d] = Σ_k attention[n,h,q,k] · V[n,k,h,d]
        let embed = h * d;
        let mut out = vec![0.0; n * query_len * embed];
        out.par_chunks_mut(embed)
            .enumerate()
            .for_each(|(bq, row)| {
                let (b, qi) = (bq / query_len, bq % query_len);
                for head in 0..h {
                    let w_off = ((b * h + head) * query_len + qi) * key_len;
                    let weights = &attention.data[w_off..w_off + key_len];
                    let dst = &mut row[head * d..(head + 1) * d];
                    for (ki, &w) in weights.iter().enumerate() {
                        let v_off = ((b * key_len + ki) * h + head) * d;
                        for (o, &val) in dst.iter_mut().zip(&v.data[v_off..v_off + d]) {
                            *o += w * val;
                        }
                    }
                }
            });

        let out = Tensor::new(out, vec![n, query_len, embed]);
        let out = self.fc_out.forward(&out)?;

        log::trace!(
            "attention: q_len={} k_len={} heads={} -> {:?}",
            query_len,
            key_len,
            h,
            out.shape
        );

        Ok((out, attention))
    }

    fn check_input(&self, t: &Tensor) -> Result<()> {
        if t.shape.len() != 3 || t.shape[2] != self.embed_size {
            let mut expected = t.shape.iter().take(2).copied().collect::<Vec<_>>();
            expected.resize(2, 0);
            expected.push(self.embed_size);
            return Err(Error::ShapeMismatch {
                expected,
                got: t.shape.clone(),
            });
        }
        Ok(())
    }

    pub fn num_parameters(&self) -> usize {
        self.values.num_parameters()
            + self.keys.num_parameters()
            + self.queries.num_parameters()
            + self.fc_out.num_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eye(n: usize) -> Tensor {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Tensor::new(data, vec![n, n])
    }

    fn attention(embed_size: usize, heads: usize, seed: u64) -> MultiHeadAttention {
        let mut init = ParamInit::new(seed, 0.5).unwrap();
        MultiHeadAttention::new(embed_size, heads, &mut init).unwrap()
    }

    /// Projections set to identity so scores are plain dot products
    fn identity_attention(embed_size: usize, heads: usize) -> MultiHeadAttention {
        let mut attn = attention(embed_size, heads, 0);
        let d = attn.head_dim;
        attn.values.weight = eye(d);
        attn.keys.weight = eye(d);
        attn.queries.weight = eye(d);
        attn.fc_out.weight = eye(embed_size);
        attn
    }

    fn input(n: usize, len: usize, e: usize, offset: f32) -> Tensor {
        let data = (0..n * len * e)
            .map(|i| ((i as f32 * 0.37 + offset).sin()) * 2.0)
            .collect();
        Tensor::new(data, vec![n, len, e])
    }

    fn assert_rows_are_distributions(weights: &Tensor) {
        let k = weights.last_dim();
        for row in weights.data.chunks(k) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row sums to {sum}");
            assert!(row.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_indivisible_heads() {
        let mut init = ParamInit::new(0, 0.02).unwrap();
        assert!(matches!(
            MultiHeadAttention::new(10, 3, &mut init),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_output_and_weight_shapes() {
        let attn = attention(8, 2, 1);
        let kv = input(3, 5, 8, 0.0);
        let q = input(3, 4, 8, 1.0);
        let (out, weights) = attn.forward(&kv, &kv, &q, None).unwrap();
        assert_eq!(out.shape, vec![3, 4, 8]);
        assert_eq!(weights.shape, vec![3, 2, 4, 5]);
        assert_rows_are_distributions(&weights);
    }

    #[test]
    fn test_scale_uses_full_embed_size() {
        let attn = identity_attention(4, 2);
        assert_eq!(attn.scale(), 2.0);

        let query = Tensor::new(vec![1.0, 0.0, 0.0, 1.0], vec![1, 1, 4]);
        let keys = Tensor::new(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0], vec![1, 2, 4]);
        let (out, weights) = attn.forward(&keys, &keys, &query, None).unwrap();

        // head 0 scores [1, 0] / 2, head 1 scores [0, 2] / 2
        let e_half = 0.5f32.exp();
        let e = 1.0f32.exp();
        let expected = [e_half / (e_half + 1.0), 1.0 / (e_half + 1.0), 1.0 / (1.0 + e), e / (1.0 + e)];
        for (w, x) in weights.data.iter().zip(expected) {
            assert!((w - x).abs() < 1e-6, "{w} vs {x}");
        }

        // out = [w00 * 1, 0, 0, w11 * 2]
        assert!((out.data[0] - expected[0]).abs() < 1e-6);
        assert!(out.data[1].abs() < 1e-6);
        assert!(out.data[2].abs() < 1e-6);
        assert!((out.data[3] - 2.0 * expected[3]).abs() < 1e-6);
    }

    #[test]
    fn test_scores_divided_by_sqrt_embed_size() {
        // √6 is not exact, so dividing and multiplying by the reciprocal can differ
        let attn = identity_attention(6, 1);
        let mut query = vec![0.0; 6];
        query[0] = 1.0;
        query[1] = 2.0;
        let query = Tensor::new(query, vec![1, 1, 6]);
        let mut keys = vec![0.0; 18];
        keys[0] = 1.0;
        keys[7] = 1.0;
        keys[12] = 1.0;
        keys[13] = 1.0;
        let keys = Tensor::new(keys, vec![1, 3, 6]);

        let (_, weights) = attn.forward(&keys, &keys, &query, None).unwrap();

        let expected = Tensor::new(vec![1.0, 2.0, 3.0], vec![1, 1, 1, 3])
            .div_scalar(6.0f32.sqrt())
            .softmax_last();
        assert_eq!(weights.data, expected.data);
    }

    #[test]
    fn test_masked_key_gets_zero_weight() {
        let attn = attention(8, 4, 2);
        let x = input(2, 4, 8, 0.3);
        let mask = Mask::new(vec![true, true, false, true], vec![4]).unwrap();
        let (_, weights) = attn.forward(&x, &x, &x, Some(&mask)).unwrap();
        assert_rows_are_distributions(&weights);
        for (i, &w) in weights.data.iter().enumerate() {
            if i % 4 == 2 {
                assert!(w < 1e-6, "masked weight {w}");
            }
        }
    }

    #[test]
    fn test_fully_masked_row_is_uniform() {
        let attn = attention(4, 2, 3);
        let x = input(1, 3, 4, 0.0);
        // Query 0 may see nothing, the others see everything
        let mut data = vec![true; 9];
        data[..3].fill(false);
        let mask = Mask::new(data, vec![3, 3]).unwrap();
        let (out, weights) = attn.forward(&x, &x, &x, Some(&mask)).unwrap();
        for head in 0..2 {
            for k in 0..3 {
                assert!((weights.get(&[0, head, 0, k]) - 1.0 / 3.0).abs() < 1e-6);
            }
        }
        assert!(out.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_padding_mask_per_batch() {
        let attn = attention(4, 2, 4);
        let x = input(2, 3, 4, 0.0);
        let mask = Mask::padding(&[vec![1, 1, 0], vec![1, 0, 0]], 0).unwrap();
        let (_, weights) = attn.forward(&x, &x, &x, Some(&mask)).unwrap();
        for head in 0..2 {
            for q in 0..3 {
                assert!(weights.get(&[0, head, q, 2]) < 1e-6);
                assert!(weights.get(&[1, head, q, 1]) < 1e-6);
                assert!(weights.get(&[1, head, q, 2]) < 1e-6);
                assert!((weights.get(&[1, head, q, 0]) - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_empty_query_and_key() {
        let attn = attention(4, 2, 5);
        let kv = input(2, 3, 4, 0.0);
        let empty = Tensor::zeros(vec![2, 0, 4]);

        let (out, weights) = attn.forward(&kv, &kv, &empty, None).unwrap();
        assert_eq!(out.shape, vec![2, 0, 4]);
        assert_eq!(weights.shape, vec![2, 2, 0, 3]);

        let q = input(2, 3, 4, 1.0);
        let (out, weights) = attn.forward(&empty, &empty, &q, None).unwrap();
        assert_eq!(out.shape, vec![2, 3, 4]);
        assert_eq!(weights.shape, vec![2, 2, 3, 0]);
    }

    #[test]
    fn test_shape_errors() {
        let attn = attention(4, 2, 6);
        let x = input(2, 3, 4, 0.0);

        let other_batch = input(1, 3, 4, 0.0);
        assert!(matches!(
            attn.forward(&other_batch, &other_batch, &x, None),
            Err(Error::BatchMismatch { expected: 2, got: 1 })
        ));

        let wrong_width = input(2, 3, 6, 0.0);
        assert!(matches!(
            attn.forward(&x, &x, &wrong_width, None),
            Err(Error::ShapeMismatch { .. })
        ));

        let shorter = input(2, 2, 4, 0.0);
        assert!(matches!(
            attn.forward(&shorter, &x, &x, None),
            Err(Error::ShapeMismatch { .. })
        ));

        let mask = Mask::causal(4);
        assert!(matches!(
            attn.forward(&x, &x, &x, Some(&mask)),
            Err(Error::MaskShape { .. })
        ));
    }

    #[test]
    fn test_scaling_query_keeps_weight_order() {
        let attn = identity_attention(4, 1);
        let keys = input(1, 5, 4, 0.7);
        let query = input(1, 1, 4, 2.1);
        let (_, base) = attn.forward(&keys, &keys, &query, None).unwrap();
        let (_, scaled) = attn
            .forward(&keys, &keys, &query.mul_scalar(50.0), None)
            .unwrap();

        for i in 0..5 {
            for j in 0..5 {
                if base.data[i] > base.data[j] + 1e-6 {
                    assert!(scaled.data[i] >= scaled.data[j]);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_weights_are_distributions(
            seed in 0u64..1000,
            n in 1usize..3,
            q_len in 1usize..5,
            k_len in 1usize..5,
            heads in prop::sample::select(vec![1usize, 2, 4]),
        ) {
            let attn = attention(8, heads, seed);
            let kv = input(n, k_len, 8, seed as f32);
            let q = input(n, q_len, 8, seed as f32 + 0.5);
            let (out, weights) = attn.forward(&kv, &kv, &q, None).unwrap();
            prop_assert_eq!(out.shape, vec![n, q_len, 8]);
            prop_assert_eq!(weights.shape.clone(), vec![n, heads, q_len, k_len]);
            for row in weights.data.chunks(k_len) {
                let sum: f32 = row.iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-5);
                prop_assert!(row.iter().all(|&w| w >= 0.0));
            }
        }
    }
}
